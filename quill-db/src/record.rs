use quill_common::model::{
    Id, ModelValidationError,
    auth::Authentication,
    category::{Category, CategoryName},
    comment::{Comment, CommentText},
    message::{Message, MessageBody, MessageSubject},
    notification::Notification,
    post::{Post, PostBody, PostTitle},
    user::{Credentials, PasswordHash, Profile, User, UserHandle},
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_snowflake: i64,
    pub handle: String,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct ProfileRecord {
    pub bio: String,
    pub country: String,
    pub city: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CategoryRecord {
    pub category_snowflake: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
}

/// A category together with the post it is attached to.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostCategoryRecord {
    pub post_snowflake: i64,
    #[sqlx(flatten)]
    pub category: CategoryRecord,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub body: String,
    pub published_at: OffsetDateTime,
    pub for_subscribers: bool,
    pub like_count: i64,
    pub user_snowflake: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub approved: bool,
    pub user_snowflake: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct NotificationRecord {
    pub notification_snowflake: i64,
    pub recipient_snowflake: i64,
    pub sender_snowflake: Option<i64>,
    pub sender_name: String,
    pub kind: String,
    pub text: String,
    pub post_snowflake: Option<i64>,
    pub created_at: OffsetDateTime,
    pub is_new: bool,
    pub viewed: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct MessageRecord {
    pub message_snowflake: i64,
    pub subject: String,
    pub body: String,
    pub sent_at: OffsetDateTime,
    pub is_read: bool,
    pub sender_snowflake: i64,
    pub sender_handle: String,
    pub recipient_snowflake: i64,
    pub recipient_handle: String,
}

fn user(user_snowflake: i64, handle: String) -> Result<User, ModelValidationError> {
    Ok(User {
        id: Id::from_db(user_snowflake),
        handle: UserHandle::new(handle)?,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        user(value.user_snowflake, value.handle)
    }
}

impl TryFrom<CredentialsRecord> for Credentials {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: user(value.user_snowflake, value.handle)?,
            password_hash: PasswordHash::from_phc(value.password_hash),
        })
    }
}

impl From<ProfileRecord> for Profile {
    fn from(value: ProfileRecord) -> Self {
        Self {
            bio: value.bio,
            country: value.country,
            city: value.city,
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_snowflake),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

impl TryFrom<CategoryRecord> for Category {
    type Error = ModelValidationError;

    fn try_from(value: CategoryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.category_snowflake),
            name: CategoryName::new(value.name)?,
            slug: value.slug,
            description: value.description,
        })
    }
}

impl PostRecord {
    /// Categories are loaded separately and attached by the caller.
    pub(crate) fn into_post(self, categories: Vec<Category>) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: Id::from_db(self.post_snowflake),
            author: user(self.user_snowflake, self.handle)?,
            title: PostTitle::new(self.title)?,
            body: PostBody::new(self.body)?,
            published_at: self.published_at,
            for_subscribers: self.for_subscribers,
            categories,
            like_count: self.like_count.try_into().unwrap_or_default(),
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post: Id::from_db(value.post_snowflake),
            author: user(value.user_snowflake, value.handle)?,
            text: CommentText::new(value.text)?,
            created_at: value.created_at,
            approved: value.approved,
        })
    }
}

impl TryFrom<NotificationRecord> for Notification {
    type Error = ModelValidationError;

    fn try_from(value: NotificationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.notification_snowflake),
            recipient: Id::from_db(value.recipient_snowflake),
            sender: value.sender_snowflake.map(Id::from_db),
            sender_name: value.sender_name,
            kind: value.kind.parse()?,
            text: value.text,
            post: value.post_snowflake.map(Id::from_db),
            created_at: value.created_at,
            is_new: value.is_new,
            viewed: value.viewed,
        })
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = ModelValidationError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.message_snowflake),
            sender: user(value.sender_snowflake, value.sender_handle)?,
            recipient: user(value.recipient_snowflake, value.recipient_handle)?,
            subject: MessageSubject::new(value.subject)?,
            body: MessageBody::new(value.body)?,
            sent_at: value.sent_at,
            read: value.is_read,
        })
    }
}
