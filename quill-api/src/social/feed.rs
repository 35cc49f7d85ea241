use crate::social::{Error, Result};
use quill_common::{
    model::{
        Id,
        post::{Post, PostMarker, PostQuery},
        user::User,
    },
    visibility::{Viewer, filter_visible_posts},
};
use quill_db::store::Store;

/// Resolves who is looking, together with the authors they subscribe to.
pub async fn load_viewer(store: &dyn Store, user: Option<&User>) -> Result<Viewer> {
    Ok(match user {
        Some(user) => Viewer::user(user.id, store.fetch_subscribed_authors(user.id).await?),
        None => Viewer::Anonymous,
    })
}

/// Posts matching `query` that `viewer` may see, newest first.
pub async fn visible_posts(
    store: &dyn Store,
    viewer: &Viewer,
    query: &PostQuery,
) -> Result<Vec<Post>> {
    let posts = store.fetch_posts(query).await?;
    Ok(filter_visible_posts(viewer, posts))
}

/// `Ok(None)` when the post does not exist, [`Error::SubscribersOnly`] when
/// it exists but is gated away from `viewer`.
pub async fn visible_post(
    store: &dyn Store,
    viewer: &Viewer,
    post_id: Id<PostMarker>,
) -> Result<Option<Post>> {
    match store.fetch_post(post_id).await? {
        Some(post) if !viewer.can_see(&post) => Err(Error::SubscribersOnly(post_id)),
        post => Ok(post),
    }
}

#[cfg(test)]
mod tests {
    use super::{load_viewer, visible_post, visible_posts};
    use crate::social::{
        Error,
        subscription::subscribe,
        test_support::{post, store, user},
    };
    use quill_common::model::post::PostQuery;
    use quill_db::store::Store;

    #[tokio::test]
    async fn gated_post_appears_after_subscribing() {
        let store = store();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let gated = post(&store, &bob, "members only", true).await;
        let open = post(&store, &bob, "for everyone", false).await;

        let viewer = load_viewer(&store, Some(&alice)).await.unwrap();
        let feed = visible_posts(&store, &viewer, &PostQuery::default()).await.unwrap();
        assert_eq!(feed, vec![open.clone()]);
        assert!(matches!(
            visible_post(&store, &viewer, gated.id).await,
            Err(Error::SubscribersOnly(_))
        ));

        subscribe(&store, &alice, &bob).await.unwrap();

        let viewer = load_viewer(&store, Some(&alice)).await.unwrap();
        let feed = visible_posts(&store, &viewer, &PostQuery::default()).await.unwrap();
        assert!(feed.contains(&gated));
        assert!(feed.contains(&open));
        assert_eq!(
            visible_post(&store, &viewer, gated.id).await.unwrap(),
            Some(gated)
        );
    }

    #[tokio::test]
    async fn authors_and_anonymous_viewers() {
        let store = store();
        let bob = user(&store, "bob").await;
        let gated = post(&store, &bob, "members only", true).await;

        let author = load_viewer(&store, Some(&bob)).await.unwrap();
        assert_eq!(
            visible_post(&store, &author, gated.id).await.unwrap(),
            Some(gated.clone())
        );

        let anonymous = load_viewer(&store, None).await.unwrap();
        assert!(
            visible_posts(&store, &anonymous, &PostQuery::by_author(bob.id))
                .await
                .unwrap()
                .is_empty()
        );

        store.delete_post(gated.id).await.unwrap();
        assert_eq!(visible_post(&store, &anonymous, gated.id).await.unwrap(), None);
    }
}
