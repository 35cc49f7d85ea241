use crate::{
    server::{
        Result, ServerError, ServerRouter, Settings,
        auth::AuthenticatedUser,
        extract::{Created, Json, PageQuery, Query},
    },
    social::fanout::{Event, fan_out},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::{
    model::{
        Id,
        message::{CreateMessage, Message, MessageBody, MessageMarker, MessageSubject},
        user::UserHandle,
    },
    page::Page,
};
use quill_db::store::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(inbox)
        .typed_post(send_message)
        .typed_get(sent_messages)
        .typed_get(open_message)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/messages", rejection(ServerError))]
struct MessagesPath();

#[derive(Clone, Debug, Default, Deserialize)]
struct InboxQuery {
    page: Option<String>,
    /// Only messages sent by this handle.
    from: Option<UserHandle>,
}

async fn inbox(
    MessagesPath(): MessagesPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    user: AuthenticatedUser,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Page<Message>>> {
    let messages = store
        .fetch_inbox(user.user_id(), query.from.as_ref())
        .await?;

    Ok(Json(Page::paginate(
        messages,
        query.page.as_deref(),
        settings.page_size,
    )))
}

#[derive(Debug, Deserialize)]
struct MessageForm {
    recipient: UserHandle,
    subject: MessageSubject,
    body: MessageBody,
}

async fn send_message(
    MessagesPath(): MessagesPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<MessageForm>,
) -> Result<Created<Message>> {
    let recipient = store
        .fetch_user_by_handle(&form.recipient)
        .await?
        .ok_or(ServerError::UserByHandleNotFound(form.recipient))?;

    let message = store
        .create_message(&CreateMessage {
            sender: user.user_id(),
            recipient: recipient.id,
            subject: form.subject,
            body: form.body,
        })
        .await?;
    info!(
        message_id = %message.id,
        sender = %user.user_id(),
        recipient = %recipient.id,
        "Sent message"
    );

    fan_out(&*store, user.user(), Event::MessageSent(&message)).await?;

    Ok(Created(message))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/messages/sent", rejection(ServerError))]
struct SentMessagesPath();

async fn sent_messages(
    SentMessagesPath(): SentMessagesPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Message>>> {
    let messages = store.fetch_sent_messages(user.user_id()).await?;

    Ok(Json(Page::paginate(
        messages,
        query.page(),
        settings.page_size,
    )))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/messages/{id}", rejection(ServerError))]
struct MessagePath {
    id: Id<MessageMarker>,
}

/// Shows a message to its sender or recipient. The recipient opening it
/// marks it read.
async fn open_message(
    MessagePath { id }: MessagePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Message>> {
    let mut message = store
        .fetch_message(id)
        .await?
        .ok_or(ServerError::MessageByIdNotFound(id))?;

    if !message.involves(user.user_id()) {
        return Err(ServerError::NotMessageParticipant(id));
    }

    if message.recipient.id == user.user_id() && !message.read {
        store.mark_message_read(id).await?;
        message.read = true;
        debug!(message_id = %id, "Marked message read");
    }

    Ok(Json(message))
}
