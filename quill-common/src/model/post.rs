use crate::{
    model::{
        Id,
        category::{Category, CategoryMarker},
        user::{User, UserMarker},
    },
    util::BoundedText,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 450;
pub const POST_BODY_MAX_LEN: usize = 100_000;

pub type PostTitle = BoundedText<POST_TITLE_MAX_LEN>;
pub type PostBody = BoundedText<POST_BODY_MAX_LEN>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: User,
    pub title: PostTitle,
    pub body: PostBody,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    pub for_subscribers: bool,
    pub categories: Vec<Category>,
    pub like_count: u64,
}

/// Title, body and gating of a post as submitted by its author.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub title: PostTitle,
    pub body: PostBody,
    #[serde(default)]
    pub for_subscribers: bool,
    #[serde(default)]
    pub categories: Vec<Id<CategoryMarker>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
    pub published_at: OffsetDateTime,
}

/// Which posts a listing starts from, before visibility filtering.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostQuery {
    pub author: Option<Id<UserMarker>>,
    pub category: Option<Id<CategoryMarker>>,
    /// Case-insensitive substring of title, body or author handle.
    pub search: Option<String>,
}

impl PostQuery {
    #[must_use]
    pub fn by_author(author: Id<UserMarker>) -> Self {
        Self {
            author: Some(author),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn in_category(category: Id<CategoryMarker>) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn search(text: &str) -> Self {
        let text = text.trim();
        Self {
            search: (!text.is_empty()).then(|| text.to_owned()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, post: &Post) -> bool {
        let author_matches = self.author.is_none_or(|author| post.author.id == author);
        let category_matches = self
            .category
            .is_none_or(|category| post.categories.iter().any(|c| c.id == category));
        let search_matches = self.search.as_deref().is_none_or(|needle| {
            let needle = needle.to_lowercase();
            [post.title.get(), post.body.get(), post.author.handle.get()]
                .iter()
                .any(|haystack| haystack.to_lowercase().contains(&needle))
        });

        author_matches && category_matches && search_matches
    }
}

/// Newest first; equal timestamps keep insertion (id) order.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
