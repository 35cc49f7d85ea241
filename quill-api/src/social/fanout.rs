//! Notifications created as a side effect of user activity.
//!
//! Every notification is its own insert. A failure stops the fan-out and is
//! returned to the caller; notifications already written stay.

use crate::social::Result;
use quill_common::model::{
    comment::Comment,
    message::Message,
    notification::{CreateNotification, NotificationKind},
    post::Post,
    user::User,
};
use quill_db::store::Store;
use tracing::debug;

#[derive(Copy, Clone, Debug)]
pub enum Event<'a> {
    CommentCreated { post: &'a Post, comment: &'a Comment },
    MessageSent(&'a Message),
    PostPublished(&'a Post),
    Subscribed { author: &'a User },
}

fn notification(
    actor: &User,
    recipient: &User,
    kind: NotificationKind,
    text: String,
) -> CreateNotification {
    CreateNotification {
        recipient: recipient.id,
        sender: Some(actor.id),
        sender_name: actor.handle.get().to_owned(),
        kind,
        text,
        post: None,
    }
}

/// Writes the notifications `event` calls for and returns how many were
/// created.
///
/// A comment notification is skipped when the post author already has one
/// with the same text. The check and the insert are separate statements, so
/// two simultaneous identical comments may still both notify.
pub async fn fan_out(store: &dyn Store, actor: &User, event: Event<'_>) -> Result<usize> {
    let created = match event {
        Event::CommentCreated { post, comment } => {
            let text = comment.text.get();
            if store
                .notification_exists(post.author.id, NotificationKind::Comment, text)
                .await?
            {
                debug!(post_id = %post.id, "Skipping duplicate comment notification");
                0
            } else {
                let mut create =
                    notification(actor, &post.author, NotificationKind::Comment, text.to_owned());
                create.post = Some(post.id);
                store.create_notification(&create).await?;
                1
            }
        }
        Event::MessageSent(message) => {
            let create = notification(
                actor,
                &message.recipient,
                NotificationKind::Message,
                message.subject.get().to_owned(),
            );
            store.create_notification(&create).await?;
            1
        }
        Event::PostPublished(post) => {
            let subscribers = store.fetch_subscribers(post.author.id).await?;
            for subscriber in &subscribers {
                let mut create = notification(
                    actor,
                    subscriber,
                    NotificationKind::Post,
                    post.title.get().to_owned(),
                );
                create.post = Some(post.id);
                store.create_notification(&create).await?;
            }
            subscribers.len()
        }
        Event::Subscribed { author } => {
            let text = format!("{} subscribed to your updates", actor.handle.get());
            store
                .create_notification(&notification(
                    actor,
                    author,
                    NotificationKind::Subscriber,
                    text,
                ))
                .await?;
            1
        }
    };

    debug!(actor = %actor.id, created, "Fanned out notifications");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::{Event, fan_out};
    use crate::social::test_support::{post, store, user};
    use quill_common::model::{
        comment::{CommentText, CreateComment},
        message::{CreateMessage, MessageBody, MessageSubject},
        notification::NotificationKind,
    };
    use quill_db::store::Store;

    #[tokio::test]
    async fn identical_comments_notify_once() {
        let store = store();
        let author = user(&store, "author").await;
        let reader = user(&store, "reader").await;
        let post = post(&store, &author, "hello", false).await;

        let mut created = 0;
        for _ in 0..3 {
            let comment = store
                .create_comment(&CreateComment {
                    post: post.id,
                    author: reader.id,
                    text: CommentText::new("first!".to_owned()).unwrap(),
                })
                .await
                .unwrap();
            created += fan_out(
                &store,
                &reader,
                Event::CommentCreated {
                    post: &post,
                    comment: &comment,
                },
            )
            .await
            .unwrap();
        }

        let notifications = store.fetch_new_notifications(author.id).await.unwrap();
        assert_eq!(created, 1);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Comment);
        assert_eq!(notifications[0].text, "first!");
        assert_eq!(notifications[0].post, Some(post.id));
        assert_eq!(store.fetch_comments(post.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn new_posts_reach_every_subscriber() {
        let store = store();
        let author = user(&store, "author").await;
        let first = user(&store, "first").await;
        let second = user(&store, "second").await;
        let bystander = user(&store, "bystander").await;
        store.create_subscription(first.id, author.id).await.unwrap();
        store.create_subscription(second.id, author.id).await.unwrap();

        let post = post(&store, &author, "Release notes: v2", true).await;
        let created = fan_out(&store, &author, Event::PostPublished(&post))
            .await
            .unwrap();

        assert_eq!(created, 2);
        for subscriber in [&first, &second] {
            let notifications = store.fetch_new_notifications(subscriber.id).await.unwrap();
            assert_eq!(notifications.len(), 1);
            assert_eq!(notifications[0].text, "Release notes: v2");
            assert_eq!(notifications[0].sender, Some(author.id));
        }
        assert!(
            store
                .fetch_new_notifications(bystander.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn messages_notify_the_recipient_with_the_subject() {
        let store = store();
        let sender = user(&store, "sender").await;
        let recipient = user(&store, "recipient").await;
        let message = store
            .create_message(&CreateMessage {
                sender: sender.id,
                recipient: recipient.id,
                subject: MessageSubject::new("Re: lunch at 12:30".to_owned()).unwrap(),
                body: MessageBody::new("works for me".to_owned()).unwrap(),
            })
            .await
            .unwrap();

        fan_out(&store, &sender, Event::MessageSent(&message))
            .await
            .unwrap();

        let notifications = store.fetch_new_notifications(recipient.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Message);
        assert_eq!(notifications[0].text, "Re: lunch at 12:30");
        assert_eq!(notifications[0].sender_name, "sender");
    }
}
