use crate::{
    model::{
        Id,
        post::PostMarker,
        user::{User, UserMarker},
    },
    util::BoundedText,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const COMMENT_TEXT_MAX_LEN: usize = 10_000;

pub type CommentText = BoundedText<COMMENT_TEXT_MAX_LEN>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post: Id<PostMarker>,
    pub author: User,
    pub text: CommentText,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub approved: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub post: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub text: CommentText,
}
