use crate::model::{Id, post::PostMarker, user::UserMarker};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct NotificationMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Comment,
    Message,
    Post,
    Subscriber,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Message => "message",
            Self::Post => "post",
            Self::Subscriber => "subscriber",
        }
    }

    /// Human readable heading shown next to the text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Comment => "New comment",
            Self::Message => "New message",
            Self::Post => "New post",
            Self::Subscriber => "New subscriber",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown notification kind: {0}")]
pub struct UnknownNotificationKindError(String);

impl FromStr for NotificationKind {
    type Err = UnknownNotificationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comment" => Ok(Self::Comment),
            "message" => Ok(Self::Message),
            "post" => Ok(Self::Post),
            "subscriber" => Ok(Self::Subscriber),
            other => Err(UnknownNotificationKindError(other.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Notification {
    pub id: Id<NotificationMarker>,
    pub recipient: Id<UserMarker>,
    pub sender: Option<Id<UserMarker>>,
    pub sender_name: String,
    pub kind: NotificationKind,
    pub text: String,
    pub post: Option<Id<PostMarker>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_new: bool,
    pub viewed: bool,
}

/// Renders `label: text`. Display only; the kind and text are stored apart
/// so a colon inside the text never confuses anything.
impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.text)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateNotification {
    pub recipient: Id<UserMarker>,
    pub sender: Option<Id<UserMarker>>,
    pub sender_name: String,
    pub kind: NotificationKind,
    pub text: String,
    pub post: Option<Id<PostMarker>>,
}

#[cfg(test)]
mod tests {
    use super::{Notification, NotificationKind};
    use time::macros::datetime;

    #[test]
    fn kinds_round_trip_through_storage_names() {
        for kind in [
            NotificationKind::Comment,
            NotificationKind::Message,
            NotificationKind::Post,
            NotificationKind::Subscriber,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
        }
        assert!("comment:".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn text_with_colons_is_kept_whole() {
        let notification = Notification {
            id: 1.into(),
            recipient: 2.into(),
            sender: Some(3.into()),
            sender_name: "ada".to_owned(),
            kind: NotificationKind::Comment,
            text: "ratio: 3:2, see https://example.org".to_owned(),
            post: None,
            created_at: datetime!(2026-05-01 09:00 UTC),
            is_new: true,
            viewed: false,
        };

        assert_eq!(
            notification.to_string(),
            "New comment: ratio: 3:2, see https://example.org"
        );

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["kind"], "comment");
        assert_eq!(json["text"], "ratio: 3:2, see https://example.org");
    }
}
