use crate::{
    model::{
        Id,
        user::{User, UserMarker},
    },
    util::BoundedText,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const MESSAGE_SUBJECT_MAX_LEN: usize = 200;
pub const MESSAGE_BODY_MAX_LEN: usize = 10_000;

pub type MessageSubject = BoundedText<MESSAGE_SUBJECT_MAX_LEN>;
pub type MessageBody = BoundedText<MESSAGE_BODY_MAX_LEN>;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct MessageMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Message {
    pub id: Id<MessageMarker>,
    pub sender: User,
    pub recipient: User,
    pub subject: MessageSubject,
    pub body: MessageBody,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    pub read: bool,
}

impl Message {
    #[must_use]
    pub fn involves(&self, user: Id<UserMarker>) -> bool {
        self.sender.id == user || self.recipient.id == user
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateMessage {
    pub sender: Id<UserMarker>,
    pub recipient: Id<UserMarker>,
    pub subject: MessageSubject,
    pub body: MessageBody,
}
