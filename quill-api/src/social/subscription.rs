use crate::social::{
    Error, Result,
    fanout::{Event, fan_out},
};
use quill_common::model::{
    Id,
    user::{User, UserMarker},
};
use quill_db::store::{DbError, Store};
use tracing::info;

/// Get-or-create of the edge `subscriber -> author`.
///
/// Returns whether a new edge was created. Only a new edge notifies the
/// author. Subscribing again over an existing edge notifies nobody.
pub async fn subscribe(store: &dyn Store, subscriber: &User, author: &User) -> Result<bool> {
    if subscriber.id == author.id {
        return Err(Error::SelfSubscription);
    }

    let created = store.create_subscription(subscriber.id, author.id).await?;
    if created {
        info!(subscriber = %subscriber.id, author = %author.id, "New subscription");
        fan_out(store, subscriber, Event::Subscribed { author }).await?;
    }

    Ok(created)
}

/// Removes the edge if it exists. Returns whether there was one.
pub async fn unsubscribe(store: &dyn Store, subscriber: &User, author: &User) -> Result<bool> {
    let removed = store.delete_subscription(subscriber.id, author.id).await?;
    if removed {
        info!(subscriber = %subscriber.id, author = %author.id, "Subscription removed");
    }

    Ok(removed)
}

/// Flips the subscription to `author_id` and returns whether `subscriber`
/// is subscribed afterwards.
pub async fn toggle_subscription(
    store: &dyn Store,
    subscriber: &User,
    author_id: Id<UserMarker>,
) -> Result<bool> {
    let author = store
        .fetch_user(author_id)
        .await?
        .ok_or(DbError::UnknownUser(author_id))?;

    if store.is_subscribed(subscriber.id, author.id).await? {
        unsubscribe(store, subscriber, &author).await?;
        Ok(false)
    } else {
        subscribe(store, subscriber, &author).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{subscribe, toggle_subscription, unsubscribe};
    use crate::social::{
        Error,
        test_support::{store, user},
    };
    use quill_common::model::notification::NotificationKind;
    use quill_db::store::{DbError, Store};

    #[tokio::test]
    async fn subscribing_twice_keeps_one_edge_and_one_notification() {
        let store = store();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;

        assert!(subscribe(&store, &alice, &bob).await.unwrap());
        assert!(!subscribe(&store, &alice, &bob).await.unwrap());

        assert_eq!(store.count_subscribers(bob.id).await.unwrap(), 1);
        let notifications = store.fetch_new_notifications(bob.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Subscriber);
        assert_eq!(notifications[0].text, "alice subscribed to your updates");
    }

    #[tokio::test]
    async fn self_subscription_never_writes() {
        let store = store();
        let alice = user(&store, "alice").await;

        assert!(matches!(
            subscribe(&store, &alice, &alice).await,
            Err(Error::SelfSubscription)
        ));
        assert!(matches!(
            toggle_subscription(&store, &alice, alice.id).await,
            Err(Error::SelfSubscription)
        ));
        assert_eq!(store.count_subscribers(alice.id).await.unwrap(), 0);
        assert!(store.fetch_new_notifications(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribing_without_an_edge_is_a_no_op() {
        let store = store();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;

        assert!(!unsubscribe(&store, &alice, &bob).await.unwrap());
        assert_eq!(store.count_subscribers(bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn toggling_flips_the_edge() {
        let store = store();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;

        assert!(toggle_subscription(&store, &alice, bob.id).await.unwrap());
        assert!(store.is_subscribed(alice.id, bob.id).await.unwrap());
        assert!(!toggle_subscription(&store, &alice, bob.id).await.unwrap());
        assert!(!store.is_subscribed(alice.id, bob.id).await.unwrap());

        assert!(matches!(
            toggle_subscription(&store, &alice, 999.into()).await,
            Err(Error::Store(DbError::UnknownUser(_)))
        ));
    }
}
