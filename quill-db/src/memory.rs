//! A [`Store`] kept entirely in process memory.
//!
//! Used when no database is configured and by tests. Each method takes the
//! table lock once, so every call is atomic on its own, the same guarantee
//! the Postgres store gives per statement.

use crate::store::{DbError, Result, Store};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use quill_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        category::{Category, CategoryMarker, CreateCategory, unique_slug},
        comment::{Comment, CommentMarker, CommentText, CreateComment},
        message::{CreateMessage, Message, MessageBody, MessageMarker, MessageSubject},
        notification::{CreateNotification, Notification, NotificationKind, NotificationMarker},
        post::{
            CreatePost, Post, PostBody, PostContent, PostMarker, PostQuery, PostTitle,
            sort_newest_first,
        },
        user::{
            CreateUser, Credentials, EmailAddress, PasswordHash, Profile, User, UserHandle,
            UserMarker,
        },
    },
    snowflake::SnowflakeGenerator,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use time::OffsetDateTime;
use tracing::debug;

#[derive(Clone, Debug)]
struct UserRow {
    user: User,
    email: EmailAddress,
    password_hash: PasswordHash,
    profile: Profile,
}

#[derive(Clone, Debug)]
struct PostRow {
    author: Id<UserMarker>,
    title: PostTitle,
    body: PostBody,
    published_at: OffsetDateTime,
    for_subscribers: bool,
    categories: Vec<Id<CategoryMarker>>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: CommentText,
    created_at: OffsetDateTime,
    approved: bool,
}

#[derive(Clone, Debug)]
struct MessageRow {
    sender: Id<UserMarker>,
    recipient: Id<UserMarker>,
    subject: MessageSubject,
    body: MessageBody,
    sent_at: OffsetDateTime,
    read: bool,
}

#[derive(Default, Debug)]
struct Tables {
    users: BTreeMap<Id<UserMarker>, UserRow>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    categories: BTreeMap<Id<CategoryMarker>, Category>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    likes: BTreeSet<(Id<PostMarker>, Id<UserMarker>)>,
    favorites: BTreeSet<(Id<PostMarker>, Id<UserMarker>)>,
    comments: BTreeMap<Id<CommentMarker>, CommentRow>,
    /// (subscriber, author)
    subscriptions: BTreeSet<(Id<UserMarker>, Id<UserMarker>)>,
    notifications: BTreeMap<Id<NotificationMarker>, Notification>,
    messages: BTreeMap<Id<MessageMarker>, MessageRow>,
}

impl Tables {
    fn user(&self, user_id: Id<UserMarker>) -> Option<User> {
        self.users.get(&user_id).map(|row| row.user.clone())
    }

    fn post(&self, post_id: Id<PostMarker>) -> Option<Post> {
        let row = self.posts.get(&post_id)?;
        let like_count = self.likes.iter().filter(|(post, _)| *post == post_id).count();

        Some(Post {
            id: post_id,
            author: self.user(row.author)?,
            title: row.title.clone(),
            body: row.body.clone(),
            published_at: row.published_at,
            for_subscribers: row.for_subscribers,
            categories: row
                .categories
                .iter()
                .filter_map(|category| self.categories.get(category).cloned())
                .collect(),
            like_count: like_count as u64,
        })
    }

    fn comment(&self, comment_id: Id<CommentMarker>, row: &CommentRow) -> Option<Comment> {
        Some(Comment {
            id: comment_id,
            post: row.post,
            author: self.user(row.author)?,
            text: row.text.clone(),
            created_at: row.created_at,
            approved: row.approved,
        })
    }

    fn message(&self, message_id: Id<MessageMarker>, row: &MessageRow) -> Option<Message> {
        Some(Message {
            id: message_id,
            sender: self.user(row.sender)?,
            recipient: self.user(row.recipient)?,
            subject: row.subject.clone(),
            body: row.body.clone(),
            sent_at: row.sent_at,
            read: row.read,
        })
    }

    fn check_user(&self, user_id: Id<UserMarker>) -> Result<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(DbError::UnknownUser(user_id))
        }
    }

    fn check_post(&self, post_id: Id<PostMarker>) -> Result<()> {
        if self.posts.contains_key(&post_id) {
            Ok(())
        } else {
            Err(DbError::UnknownPost(post_id))
        }
    }

    fn check_categories(&self, categories: &[Id<CategoryMarker>]) -> Result<()> {
        match categories
            .iter()
            .find(|category| !self.categories.contains_key(category))
        {
            Some(missing) => Err(DbError::UnknownCategory(*missing)),
            None => Ok(()),
        }
    }
}

fn dedup_categories(categories: &[Id<CategoryMarker>]) -> Vec<Id<CategoryMarker>> {
    let mut seen = BTreeSet::new();
    categories
        .iter()
        .copied()
        .filter(|category| seen.insert(*category))
        .collect()
}

fn newest_messages_first(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
    messages
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    snowflake_generator: Mutex<SnowflakeGenerator>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(snowflake_generator: SnowflakeGenerator) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snowflake_generator: Mutex::new(snowflake_generator),
        }
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        Ok(self.snowflake_generator.lock().generate()?.into())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = self.next_id()?;
        let mut tables = self.tables.write();

        if tables.users.values().any(|row| row.user.handle == user.handle) {
            return Err(DbError::HandleTaken(user.handle.clone()));
        }

        let created = User {
            id: user_id,
            handle: user.handle.clone(),
        };
        tables.users.insert(
            user_id,
            UserRow {
                user: created.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                profile: user.profile.clone(),
            },
        );

        debug!(%user_id, "Created user in memory");
        Ok(created)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.tables.read().user(user_id))
    }

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|row| row.user.handle == *handle)
            .map(|row| row.user.clone()))
    }

    async fn fetch_credentials(&self, login: &str) -> Result<Option<Credentials>> {
        let tables = self.tables.read();
        let row = tables
            .users
            .values()
            .find(|row| row.user.handle.get() == login)
            .or_else(|| {
                tables
                    .users
                    .values()
                    .find(|row| row.email.get().eq_ignore_ascii_case(login))
            });

        Ok(row.map(|row| Credentials {
            user: row.user.clone(),
            password_hash: row.password_hash.clone(),
        }))
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .tables
            .read()
            .users
            .values()
            .map(|row| row.user.clone())
            .collect();
        users.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(users)
    }

    async fn search_user_handles(&self, fragment: &str, limit: usize) -> Result<Vec<UserHandle>> {
        let fragment = fragment.to_lowercase();
        let mut handles: Vec<UserHandle> = self
            .tables
            .read()
            .users
            .values()
            .filter(|row| row.user.handle.get().to_lowercase().contains(&fragment))
            .map(|row| row.user.handle.clone())
            .collect();
        handles.sort();
        handles.truncate(limit);
        Ok(handles)
    }

    async fn fetch_profile(&self, user_id: Id<UserMarker>) -> Result<Option<Profile>> {
        Ok(self
            .tables
            .read()
            .users
            .get(&user_id)
            .map(|row| row.profile.clone()))
    }

    async fn update_profile(&self, user_id: Id<UserMarker>, profile: &Profile) -> Result<bool> {
        Ok(match self.tables.write().users.get_mut(&user_id) {
            Some(row) => {
                row.profile = profile.clone();
                true
            }
            None => false,
        })
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        self.tables
            .write()
            .authentications
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(self.tables.read().authentications.get(token_hash).cloned())
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .authentications
            .remove(token_hash)
            .is_some())
    }

    async fn create_category(&self, category: &CreateCategory) -> Result<Category> {
        let category_id = self.next_id()?;
        let mut tables = self.tables.write();

        let slug = unique_slug(&category.name, |candidate| {
            tables
                .categories
                .values()
                .any(|existing| existing.slug == candidate)
        });
        let created = Category {
            id: category_id,
            name: category.name.clone(),
            slug,
            description: category.description.clone(),
        };
        tables.categories.insert(category_id, created.clone());

        Ok(created)
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> =
            self.tables.read().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn fetch_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(self
            .tables
            .read()
            .categories
            .values()
            .find(|category| category.slug == slug)
            .cloned())
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id = self.next_id()?;
        let mut tables = self.tables.write();
        tables.check_user(post.author)?;
        tables.check_categories(&post.content.categories)?;

        tables.posts.insert(
            post_id,
            PostRow {
                author: post.author,
                title: post.content.title.clone(),
                body: post.content.body.clone(),
                published_at: post.published_at,
                for_subscribers: post.content.for_subscribers,
                categories: dedup_categories(&post.content.categories),
            },
        );

        tables.post(post_id).ok_or(DbError::UnknownPost(post_id))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.tables.read().post(post_id))
    }

    async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let tables = self.tables.read();
        let mut posts: Vec<Post> = tables
            .posts
            .keys()
            .filter_map(|post_id| tables.post(*post_id))
            .filter(|post| query.matches(post))
            .collect();
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables.write();
        tables.check_categories(&content.categories)?;

        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        row.title = content.title.clone();
        row.body = content.body.clone();
        row.for_subscribers = content.for_subscribers;
        row.categories = dedup_categories(&content.categories);

        Ok(tables.post(post_id))
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.posts.remove(&post_id).is_none() {
            return Ok(false);
        }

        tables.likes.retain(|(post, _)| *post != post_id);
        tables.favorites.retain(|(post, _)| *post != post_id);
        tables.comments.retain(|_, comment| comment.post != post_id);
        for notification in tables.notifications.values_mut() {
            if notification.post == Some(post_id) {
                notification.post = None;
            }
        }

        Ok(true)
    }

    async fn toggle_like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<bool> {
        let mut tables = self.tables.write();
        tables.check_post(post_id)?;
        let key = (post_id, user_id);
        if tables.likes.remove(&key) {
            Ok(false)
        } else {
            tables.likes.insert(key);
            Ok(true)
        }
    }

    async fn toggle_favorite(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        tables.check_post(post_id)?;
        let key = (post_id, user_id);
        if tables.favorites.remove(&key) {
            Ok(false)
        } else {
            tables.favorites.insert(key);
            Ok(true)
        }
    }

    async fn fetch_favorite_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let tables = self.tables.read();
        let mut posts: Vec<Post> = tables
            .favorites
            .iter()
            .filter(|(_, user)| *user == user_id)
            .filter_map(|(post, _)| tables.post(*post))
            .collect();
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment_id = self.next_id()?;
        let row = CommentRow {
            post: comment.post,
            author: comment.author,
            text: comment.text.clone(),
            created_at: OffsetDateTime::now_utc(),
            approved: true,
        };

        let mut tables = self.tables.write();
        tables.check_post(comment.post)?;
        let created = tables
            .comment(comment_id, &row)
            .ok_or(DbError::UnknownUser(comment.author))?;
        tables.comments.insert(comment_id, row);

        Ok(created)
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables.read();
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|(_, row)| row.post == post_id && row.approved)
            .filter_map(|(comment_id, row)| tables.comment(*comment_id, row))
            .collect();
        comments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(comments)
    }

    async fn create_subscription(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        tables.check_user(subscriber)?;
        tables.check_user(author)?;
        Ok(tables.subscriptions.insert((subscriber, author)))
    }

    async fn delete_subscription(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .subscriptions
            .remove(&(subscriber, author)))
    }

    async fn is_subscribed(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .subscriptions
            .contains(&(subscriber, author)))
    }

    async fn fetch_subscribed_authors(
        &self,
        subscriber: Id<UserMarker>,
    ) -> Result<Vec<Id<UserMarker>>> {
        Ok(self
            .tables
            .read()
            .subscriptions
            .iter()
            .filter(|(from, _)| *from == subscriber)
            .map(|(_, author)| *author)
            .collect())
    }

    async fn fetch_subscribers(&self, author: Id<UserMarker>) -> Result<Vec<User>> {
        let tables = self.tables.read();
        let mut subscribers: Vec<User> = tables
            .subscriptions
            .iter()
            .filter(|(_, to)| *to == author)
            .filter_map(|(subscriber, _)| tables.user(*subscriber))
            .collect();
        subscribers.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(subscribers)
    }

    async fn count_subscribers(&self, author: Id<UserMarker>) -> Result<u64> {
        let count = self
            .tables
            .read()
            .subscriptions
            .iter()
            .filter(|(_, to)| *to == author)
            .count();
        Ok(count as u64)
    }

    async fn create_notification(&self, notification: &CreateNotification) -> Result<Notification> {
        self.tables.read().check_user(notification.recipient)?;
        let created = Notification {
            id: self.next_id()?,
            recipient: notification.recipient,
            sender: notification.sender,
            sender_name: notification.sender_name.clone(),
            kind: notification.kind,
            text: notification.text.clone(),
            post: notification.post,
            created_at: OffsetDateTime::now_utc(),
            is_new: true,
            viewed: false,
        };
        self.tables
            .write()
            .notifications
            .insert(created.id, created.clone());

        Ok(created)
    }

    async fn notification_exists(
        &self,
        recipient: Id<UserMarker>,
        kind: NotificationKind,
        text: &str,
    ) -> Result<bool> {
        Ok(self.tables.read().notifications.values().any(|notification| {
            notification.recipient == recipient
                && notification.kind == kind
                && notification.text == text
        }))
    }

    async fn fetch_notification(
        &self,
        notification_id: Id<NotificationMarker>,
    ) -> Result<Option<Notification>> {
        Ok(self
            .tables
            .read()
            .notifications
            .get(&notification_id)
            .cloned())
    }

    async fn fetch_new_notifications(
        &self,
        recipient: Id<UserMarker>,
    ) -> Result<Vec<Notification>> {
        Ok(self
            .tables
            .read()
            .notifications
            .values()
            .rev()
            .filter(|notification| notification.recipient == recipient && notification.is_new)
            .cloned()
            .collect())
    }

    async fn count_unviewed_notifications(&self, recipient: Id<UserMarker>) -> Result<u64> {
        let count = self
            .tables
            .read()
            .notifications
            .values()
            .filter(|notification| notification.recipient == recipient && !notification.viewed)
            .count();
        Ok(count as u64)
    }

    async fn mark_notification_viewed(
        &self,
        notification_id: Id<NotificationMarker>,
    ) -> Result<bool> {
        Ok(
            match self.tables.write().notifications.get_mut(&notification_id) {
                Some(notification) => {
                    notification.viewed = true;
                    true
                }
                None => false,
            },
        )
    }

    async fn mark_all_notifications_viewed(&self, recipient: Id<UserMarker>) -> Result<u64> {
        let mut marked = 0;
        for notification in self.tables.write().notifications.values_mut() {
            if notification.recipient == recipient && !notification.viewed {
                notification.viewed = true;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn delete_notification(&self, notification_id: Id<NotificationMarker>) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .notifications
            .remove(&notification_id)
            .is_some())
    }

    async fn delete_all_notifications(&self, recipient: Id<UserMarker>) -> Result<u64> {
        let mut tables = self.tables.write();
        let before = tables.notifications.len();
        tables
            .notifications
            .retain(|_, notification| notification.recipient != recipient);
        Ok((before - tables.notifications.len()) as u64)
    }

    async fn create_message(&self, message: &CreateMessage) -> Result<Message> {
        let message_id = self.next_id()?;
        let row = MessageRow {
            sender: message.sender,
            recipient: message.recipient,
            subject: message.subject.clone(),
            body: message.body.clone(),
            sent_at: OffsetDateTime::now_utc(),
            read: false,
        };

        let mut tables = self.tables.write();
        tables.check_user(message.sender)?;
        tables.check_user(message.recipient)?;
        let created = tables
            .message(message_id, &row)
            .ok_or(DbError::UnknownUser(message.recipient))?;
        tables.messages.insert(message_id, row);

        Ok(created)
    }

    async fn fetch_message(&self, message_id: Id<MessageMarker>) -> Result<Option<Message>> {
        let tables = self.tables.read();
        Ok(tables
            .messages
            .get(&message_id)
            .and_then(|row| tables.message(message_id, row)))
    }

    async fn mark_message_read(&self, message_id: Id<MessageMarker>) -> Result<bool> {
        Ok(match self.tables.write().messages.get_mut(&message_id) {
            Some(row) => {
                row.read = true;
                true
            }
            None => false,
        })
    }

    async fn fetch_inbox(
        &self,
        recipient: Id<UserMarker>,
        sender: Option<&UserHandle>,
    ) -> Result<Vec<Message>> {
        let tables = self.tables.read();
        let messages = tables
            .messages
            .iter()
            .filter(|(_, row)| row.recipient == recipient)
            .filter_map(|(message_id, row)| tables.message(*message_id, row))
            .filter(|message| sender.is_none_or(|sender| message.sender.handle == *sender))
            .collect();
        Ok(newest_messages_first(messages))
    }

    async fn fetch_sent_messages(&self, sender: Id<UserMarker>) -> Result<Vec<Message>> {
        let tables = self.tables.read();
        let messages = tables
            .messages
            .iter()
            .filter(|(_, row)| row.sender == sender)
            .filter_map(|(message_id, row)| tables.message(*message_id, row))
            .collect();
        Ok(newest_messages_first(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::store::{DbError, Store};
    use quill_common::{
        model::{
            category::{CategoryName, CreateCategory},
            comment::{CommentText, CreateComment},
            notification::{CreateNotification, NotificationKind},
            post::{CreatePost, PostBody, PostContent, PostQuery, PostTitle},
            user::{CreateUser, EmailAddress, PasswordHash, Profile, User, UserHandle},
        },
        snowflake::SnowflakeGenerator,
    };
    use time::{Duration, macros::datetime};

    fn store() -> MemoryStore {
        MemoryStore::new(SnowflakeGenerator::new(0, 0).unwrap())
    }

    async fn user(store: &MemoryStore, handle: &str) -> User {
        store
            .create_user(&CreateUser {
                handle: UserHandle::new(handle.to_owned()).unwrap(),
                email: EmailAddress::new(format!("{handle}@example.org")).unwrap(),
                password_hash: PasswordHash::from_phc("$argon2id$stub".to_owned()),
                profile: Profile::default(),
            })
            .await
            .unwrap()
    }

    fn content(title: &str, for_subscribers: bool) -> PostContent {
        PostContent {
            title: PostTitle::new(title.to_owned()).unwrap(),
            body: PostBody::new(format!("Body of {title}")).unwrap(),
            for_subscribers,
            categories: Vec::new(),
        }
    }

    #[tokio::test]
    async fn handles_are_unique() {
        let store = store();
        user(&store, "ada").await;

        let result = store
            .create_user(&CreateUser {
                handle: UserHandle::new("ada".to_owned()).unwrap(),
                email: EmailAddress::new("other@example.org".to_owned()).unwrap(),
                password_hash: PasswordHash::from_phc("$argon2id$stub".to_owned()),
                profile: Profile::default(),
            })
            .await;

        assert!(matches!(result, Err(DbError::HandleTaken(_))));
    }

    #[tokio::test]
    async fn credentials_by_handle_or_email() {
        let store = store();
        let ada = user(&store, "ada").await;

        let by_handle = store.fetch_credentials("ada").await.unwrap().unwrap();
        let by_email = store
            .fetch_credentials("ADA@example.org")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(by_handle.user, ada);
        assert_eq!(by_email.user, ada);
        assert!(store.fetch_credentials("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subscriptions_are_unique_edges() {
        let store = store();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;

        assert!(store.create_subscription(bob.id, ada.id).await.unwrap());
        assert!(!store.create_subscription(bob.id, ada.id).await.unwrap());
        assert_eq!(store.count_subscribers(ada.id).await.unwrap(), 1);
        assert!(store.is_subscribed(bob.id, ada.id).await.unwrap());
        assert!(!store.is_subscribed(ada.id, bob.id).await.unwrap());
        assert_eq!(
            store.fetch_subscribed_authors(bob.id).await.unwrap(),
            vec![ada.id]
        );

        assert!(store.delete_subscription(bob.id, ada.id).await.unwrap());
        assert!(!store.delete_subscription(bob.id, ada.id).await.unwrap());
        assert_eq!(store.count_subscribers(ada.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn posts_are_newest_first_with_ties_in_insertion_order() {
        let store = store();
        let ada = user(&store, "ada").await;
        let noon = datetime!(2026-03-01 12:00 UTC);

        let mut ids = Vec::new();
        for (title, published_at) in [
            ("first", noon),
            ("second", noon),
            ("older", noon - Duration::hours(1)),
        ] {
            let post = store
                .create_post(&CreatePost {
                    author: ada.id,
                    content: content(title, false),
                    published_at,
                })
                .await
                .unwrap();
            ids.push(post.id);
        }

        let listed: Vec<_> = store
            .fetch_posts(&PostQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.id)
            .collect();

        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn deleting_a_post_cascades() {
        let store = store();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;
        let post = store
            .create_post(&CreatePost {
                author: ada.id,
                content: content("doomed", false),
                published_at: datetime!(2026-03-01 12:00 UTC),
            })
            .await
            .unwrap();

        store.toggle_like(post.id, bob.id).await.unwrap();
        store
            .create_comment(&CreateComment {
                post: post.id,
                author: bob.id,
                text: CommentText::new("nice".to_owned()).unwrap(),
            })
            .await
            .unwrap();
        let notification = store
            .create_notification(&CreateNotification {
                recipient: ada.id,
                sender: Some(bob.id),
                sender_name: "bob".to_owned(),
                kind: NotificationKind::Comment,
                text: "nice".to_owned(),
                post: Some(post.id),
            })
            .await
            .unwrap();

        assert!(store.delete_post(post.id).await.unwrap());
        assert!(store.fetch_comments(post.id).await.unwrap().is_empty());
        assert!(matches!(
            store.toggle_like(post.id, bob.id).await,
            Err(DbError::UnknownPost(_))
        ));
        let kept = store
            .fetch_notification(notification.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.post, None);
    }

    #[tokio::test]
    async fn likes_toggle_and_count() {
        let store = store();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;
        let post = store
            .create_post(&CreatePost {
                author: ada.id,
                content: content("liked", false),
                published_at: datetime!(2026-03-01 12:00 UTC),
            })
            .await
            .unwrap();

        assert!(store.toggle_like(post.id, bob.id).await.unwrap());
        assert_eq!(store.fetch_post(post.id).await.unwrap().unwrap().like_count, 1);
        assert!(!store.toggle_like(post.id, bob.id).await.unwrap());
        assert_eq!(store.fetch_post(post.id).await.unwrap().unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn unknown_categories_are_rejected() {
        let store = store();
        let ada = user(&store, "ada").await;
        let rust = store
            .create_category(&CreateCategory {
                name: CategoryName::new("Rust".to_owned()).unwrap(),
                description: String::new(),
            })
            .await
            .unwrap();

        let mut tagged = content("tagged", false);
        tagged.categories = vec![rust.id, rust.id];
        let post = store
            .create_post(&CreatePost {
                author: ada.id,
                content: tagged,
                published_at: datetime!(2026-03-01 12:00 UTC),
            })
            .await
            .unwrap();
        assert_eq!(post.categories, vec![rust.clone()]);
        assert_eq!(
            store.fetch_posts(&PostQuery::in_category(rust.id)).await.unwrap(),
            vec![post]
        );

        let mut bogus = content("bogus", false);
        bogus.categories = vec![12345.into()];
        let result = store
            .create_post(&CreatePost {
                author: ada.id,
                content: bogus,
                published_at: datetime!(2026-03-01 12:00 UTC),
            })
            .await;
        assert!(matches!(result, Err(DbError::UnknownCategory(_))));
    }

    #[tokio::test]
    async fn notifications_are_marked_and_cleared() {
        let store = store();
        let ada = user(&store, "ada").await;

        for text in ["one", "two"] {
            store
                .create_notification(&CreateNotification {
                    recipient: ada.id,
                    sender: None,
                    sender_name: "system".to_owned(),
                    kind: NotificationKind::Message,
                    text: text.to_owned(),
                    post: None,
                })
                .await
                .unwrap();
        }

        let new = store.fetch_new_notifications(ada.id).await.unwrap();
        assert_eq!(
            new.iter().map(|n| n.text.as_str()).collect::<Vec<_>>(),
            ["two", "one"]
        );
        assert!(
            store
                .notification_exists(ada.id, NotificationKind::Message, "one")
                .await
                .unwrap()
        );
        assert!(
            !store
                .notification_exists(ada.id, NotificationKind::Comment, "one")
                .await
                .unwrap()
        );

        assert!(store.mark_notification_viewed(new[0].id).await.unwrap());
        assert_eq!(store.count_unviewed_notifications(ada.id).await.unwrap(), 1);
        assert_eq!(store.mark_all_notifications_viewed(ada.id).await.unwrap(), 1);
        assert_eq!(store.count_unviewed_notifications(ada.id).await.unwrap(), 0);
        assert_eq!(store.delete_all_notifications(ada.id).await.unwrap(), 2);
    }
}
