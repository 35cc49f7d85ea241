use async_trait::async_trait;
use quill_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        category::{Category, CategoryMarker, CreateCategory},
        comment::{Comment, CreateComment},
        message::{CreateMessage, Message, MessageMarker},
        notification::{CreateNotification, Notification, NotificationKind, NotificationMarker},
        post::{CreatePost, Post, PostContent, PostMarker, PostQuery},
        user::{CreateUser, Credentials, Profile, User, UserHandle, UserMarker},
    },
    snowflake::SnowflakeError,
};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not allocate an id: {0}")]
    Snowflake(#[from] SnowflakeError),
    #[error("The handle {} is already taken", .0.get())]
    HandleTaken(UserHandle),
    #[error("User with id {0} does not exist")]
    UnknownUser(Id<UserMarker>),
    #[error("Post with id {0} does not exist")]
    UnknownPost(Id<PostMarker>),
    #[error("Category with id {0} does not exist")]
    UnknownCategory(Id<CategoryMarker>),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Persistence for everything Quill knows about.
///
/// Every method is a single logical write or read. Listings come back in
/// display order: posts newest first with ties in insertion order, comments,
/// messages and notifications newest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>>;

    /// Looks `login` up as a handle first, then as an email address.
    async fn fetch_credentials(&self, login: &str) -> Result<Option<Credentials>>;

    async fn fetch_users(&self) -> Result<Vec<User>>;

    /// Handles containing `fragment`, ignoring case, ordered by handle.
    async fn search_user_handles(&self, fragment: &str, limit: usize) -> Result<Vec<UserHandle>>;

    async fn fetch_profile(&self, user_id: Id<UserMarker>) -> Result<Option<Profile>>;

    async fn update_profile(&self, user_id: Id<UserMarker>, profile: &Profile) -> Result<bool>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool>;

    async fn create_category(&self, category: &CreateCategory) -> Result<Category>;

    async fn fetch_categories(&self) -> Result<Vec<Category>>;

    async fn fetch_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    /// Returns whether the user likes the post afterwards.
    async fn toggle_like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<bool>;

    /// Returns whether the post is a favorite afterwards.
    async fn toggle_favorite(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<bool>;

    async fn fetch_favorite_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;

    /// Approved comments only.
    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Returns `false` when the edge already existed.
    async fn create_subscription(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool>;

    /// Returns `false` when there was no edge to remove.
    async fn delete_subscription(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool>;

    async fn is_subscribed(&self, subscriber: Id<UserMarker>, author: Id<UserMarker>)
    -> Result<bool>;

    async fn fetch_subscribed_authors(&self, subscriber: Id<UserMarker>)
    -> Result<Vec<Id<UserMarker>>>;

    async fn fetch_subscribers(&self, author: Id<UserMarker>) -> Result<Vec<User>>;

    async fn count_subscribers(&self, author: Id<UserMarker>) -> Result<u64>;

    async fn create_notification(&self, notification: &CreateNotification) -> Result<Notification>;

    async fn notification_exists(
        &self,
        recipient: Id<UserMarker>,
        kind: NotificationKind,
        text: &str,
    ) -> Result<bool>;

    async fn fetch_notification(
        &self,
        notification_id: Id<NotificationMarker>,
    ) -> Result<Option<Notification>>;

    /// Notifications still flagged `is_new`.
    async fn fetch_new_notifications(&self, recipient: Id<UserMarker>)
    -> Result<Vec<Notification>>;

    async fn count_unviewed_notifications(&self, recipient: Id<UserMarker>) -> Result<u64>;

    async fn mark_notification_viewed(&self, notification_id: Id<NotificationMarker>)
    -> Result<bool>;

    async fn mark_all_notifications_viewed(&self, recipient: Id<UserMarker>) -> Result<u64>;

    async fn delete_notification(&self, notification_id: Id<NotificationMarker>) -> Result<bool>;

    async fn delete_all_notifications(&self, recipient: Id<UserMarker>) -> Result<u64>;

    async fn create_message(&self, message: &CreateMessage) -> Result<Message>;

    async fn fetch_message(&self, message_id: Id<MessageMarker>) -> Result<Option<Message>>;

    async fn mark_message_read(&self, message_id: Id<MessageMarker>) -> Result<bool>;

    /// Received messages, optionally only those from `sender`.
    async fn fetch_inbox(
        &self,
        recipient: Id<UserMarker>,
        sender: Option<&UserHandle>,
    ) -> Result<Vec<Message>>;

    async fn fetch_sent_messages(&self, sender: Id<UserMarker>) -> Result<Vec<Message>>;
}
