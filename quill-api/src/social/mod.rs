//! Feed visibility, notification fan-out and the subscription graph.
//!
//! These operations sit between the HTTP handlers and the [`Store`] so they
//! can be exercised without a router.
//!
//! [`Store`]: quill_db::store::Store

use axum::http::StatusCode;
use quill_common::model::{Id, post::PostMarker};
use quill_db::store::DbError;
use thiserror::Error;

pub mod fanout;
pub mod feed;
pub mod subscription;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Users cannot subscribe to themselves")]
    SelfSubscription,
    #[error("Post with id {0} is only visible to subscribers of its author")]
    SubscribersOnly(Id<PostMarker>),
    #[error(transparent)]
    Store(#[from] DbError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::SelfSubscription => StatusCode::BAD_REQUEST,
            Error::SubscribersOnly(_) => StatusCode::FORBIDDEN,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
