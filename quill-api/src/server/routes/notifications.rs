use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, extract::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    Id,
    notification::{Notification, NotificationMarker},
};
use quill_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_notifications)
        .typed_delete(clear_notifications)
        .typed_post(mark_all_viewed)
        .typed_post(mark_viewed)
        .typed_delete(delete_notification)
}

/// The notification `user` asked for, if it is theirs.
async fn find_own_notification(
    store: &dyn Store,
    user: &AuthenticatedUser,
    notification_id: Id<NotificationMarker>,
) -> Result<Notification> {
    let notification = store
        .fetch_notification(notification_id)
        .await?
        .ok_or(ServerError::NotificationByIdNotFound(notification_id))?;

    if notification.recipient == user.user_id() {
        Ok(notification)
    } else {
        Err(ServerError::NotNotificationRecipient(notification_id))
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/notifications", rejection(ServerError))]
struct NotificationsPath();

#[derive(Debug, Serialize)]
struct NotificationList {
    notifications: Vec<Notification>,
    unviewed: u64,
}

async fn list_notifications(
    NotificationsPath(): NotificationsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<NotificationList>> {
    let notifications = store.fetch_new_notifications(user.user_id()).await?;
    let unviewed = store.count_unviewed_notifications(user.user_id()).await?;

    Ok(Json(NotificationList {
        notifications,
        unviewed,
    }))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Cleared {
    deleted: u64,
}

async fn clear_notifications(
    NotificationsPath(): NotificationsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Cleared>> {
    let deleted = store.delete_all_notifications(user.user_id()).await?;

    debug!(user_id = %user.user_id(), deleted, "Cleared notifications");
    Ok(Json(Cleared { deleted }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/notifications/viewed", rejection(ServerError))]
struct AllViewedPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Marked {
    marked: u64,
}

async fn mark_all_viewed(
    AllViewedPath(): AllViewedPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Marked>> {
    let marked = store.mark_all_notifications_viewed(user.user_id()).await?;

    Ok(Json(Marked { marked }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/notifications/{id}/viewed", rejection(ServerError))]
struct ViewedPath {
    id: Id<NotificationMarker>,
}

async fn mark_viewed(
    ViewedPath { id }: ViewedPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    find_own_notification(&*store, &user, id).await?;
    store.mark_notification_viewed(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/notifications/{id}", rejection(ServerError))]
struct NotificationPath {
    id: Id<NotificationMarker>,
}

async fn delete_notification(
    NotificationPath { id }: NotificationPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    find_own_notification(&*store, &user, id).await?;
    store.delete_notification(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{app, send, sign_up};
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    async fn message(app: &axum::Router, token: &str, recipient: &str, subject: &str) {
        let (status, _) = send(
            app,
            Method::POST,
            "/messages",
            Some(token),
            Some(json!({ "recipient": recipient, "subject": subject, "body": "..." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    fn first_id(list: &Value) -> u64 {
        list["notifications"][0]["id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn notifications_are_viewed_and_deleted() {
        let app = app();
        let (_, alice) = sign_up(&app, "alice").await;
        let (_, bob) = sign_up(&app, "bob").await;
        message(&app, &alice, "bob", "one").await;
        message(&app, &alice, "bob", "two").await;

        let (_, list) = send(&app, Method::GET, "/notifications", Some(&bob), None).await;
        assert_eq!(list["unviewed"], 2);
        let uri = format!("/notifications/{}", first_id(&list));
        let viewed_uri = format!("{uri}/viewed");

        let (status, _) = send(&app, Method::POST, &viewed_uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::POST, &viewed_uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, list) = send(&app, Method::GET, "/notifications", Some(&bob), None).await;
        assert_eq!(list["unviewed"], 1);
        assert_eq!(list["notifications"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn everything_is_marked_or_cleared_at_once() {
        let app = app();
        let (_, alice) = sign_up(&app, "alice").await;
        let (_, bob) = sign_up(&app, "bob").await;
        for subject in ["one", "two", "three"] {
            message(&app, &alice, "bob", subject).await;
        }

        let (_, marked) = send(&app, Method::POST, "/notifications/viewed", Some(&bob), None).await;
        assert_eq!(marked, json!({ "marked": 3 }));
        let (_, list) = send(&app, Method::GET, "/notifications", Some(&bob), None).await;
        assert_eq!(list["unviewed"], 0);

        let (_, cleared) = send(&app, Method::DELETE, "/notifications", Some(&bob), None).await;
        assert_eq!(cleared, json!({ "deleted": 3 }));
        let (_, list) = send(&app, Method::GET, "/notifications", Some(&bob), None).await;
        assert_eq!(list["notifications"], json!([]));
    }
}
