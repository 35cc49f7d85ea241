//! Which posts a viewer is allowed to see.
//!
//! A post gated with `for_subscribers` is only shown to its author and to
//! users subscribed to the author. Everything else is public.

use crate::model::{Id, post::Post, user::UserMarker};
use std::collections::HashSet;

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    User {
        id: Id<UserMarker>,
        subscribed_authors: HashSet<Id<UserMarker>>,
    },
}

impl Viewer {
    #[must_use]
    pub fn user(
        id: Id<UserMarker>,
        subscribed_authors: impl IntoIterator<Item = Id<UserMarker>>,
    ) -> Self {
        Self::User {
            id,
            subscribed_authors: subscribed_authors.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<Id<UserMarker>> {
        match self {
            Self::Anonymous => None,
            Self::User { id, .. } => Some(*id),
        }
    }

    #[must_use]
    pub fn can_see(&self, post: &Post) -> bool {
        if !post.for_subscribers {
            return true;
        }

        match self {
            Self::Anonymous => false,
            Self::User {
                id,
                subscribed_authors,
            } => post.author.id == *id || subscribed_authors.contains(&post.author.id),
        }
    }
}

/// Keeps the posts `viewer` may see, in their original order.
pub fn filter_visible_posts(viewer: &Viewer, posts: impl IntoIterator<Item = Post>) -> Vec<Post> {
    posts.into_iter().filter(|post| viewer.can_see(post)).collect()
}

#[cfg(test)]
mod tests {
    use super::{Viewer, filter_visible_posts};
    use crate::model::{
        Id,
        post::{Post, PostBody, PostTitle},
        user::{User, UserHandle, UserMarker},
    };
    use time::macros::datetime;

    fn user(id: u64, handle: &str) -> User {
        User {
            id: id.into(),
            handle: UserHandle::new(handle.to_owned()).unwrap(),
        }
    }

    fn post(id: u64, author: &User, for_subscribers: bool) -> Post {
        Post {
            id: id.into(),
            author: author.clone(),
            title: PostTitle::new(format!("post {id}")).unwrap(),
            body: PostBody::new("body".to_owned()).unwrap(),
            published_at: datetime!(2026-02-01 10:00 UTC),
            for_subscribers,
            categories: Vec::new(),
            like_count: 0,
        }
    }

    fn ids(posts: &[Post]) -> Vec<u64> {
        posts.iter().map(|post| post.id.into()).collect()
    }

    #[test]
    fn public_posts_are_visible_to_everyone() {
        let author = user(1, "author");
        let public = post(10, &author, false);
        let viewers = [
            Viewer::Anonymous,
            Viewer::user(2.into(), []),
            Viewer::user(1.into(), []),
            Viewer::user(3.into(), [Id::<UserMarker>::from(1)]),
        ];

        for viewer in viewers {
            assert!(viewer.can_see(&public), "{viewer:?}");
        }
    }

    #[test]
    fn gated_posts_need_authorship_or_subscription() {
        let author = user(1, "author");
        let gated = post(10, &author, true);

        assert!(!Viewer::Anonymous.can_see(&gated));
        assert!(!Viewer::user(2.into(), []).can_see(&gated));
        assert!(!Viewer::user(2.into(), [Id::from(5)]).can_see(&gated));
        assert!(Viewer::user(2.into(), [Id::from(1)]).can_see(&gated));
        assert!(Viewer::user(1.into(), []).can_see(&gated));
    }

    #[test]
    fn filter_keeps_order() {
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let posts = vec![
            post(10, &alice, false),
            post(11, &bob, true),
            post(12, &alice, true),
            post(13, &bob, false),
            post(14, &bob, true),
        ];

        assert_eq!(
            ids(&filter_visible_posts(&Viewer::Anonymous, posts.clone())),
            [10, 13]
        );
        assert_eq!(
            ids(&filter_visible_posts(&Viewer::user(1.into(), []), posts.clone())),
            [10, 12, 13]
        );
        assert_eq!(
            ids(&filter_visible_posts(
                &Viewer::user(3.into(), [bob.id]),
                posts
            )),
            [10, 11, 13, 14]
        );
    }
}
