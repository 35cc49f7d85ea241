use crate::{
    record::{
        AuthenticationRecord, CategoryRecord, CommentRecord, CredentialsRecord, MessageRecord,
        NotificationRecord, PostCategoryRecord, PostRecord, ProfileRecord, UserRecord,
    },
    store::{DbError, Result, Store},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use quill_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        category::{Category, CategoryMarker, CreateCategory, unique_slug},
        comment::{Comment, CommentMarker, CreateComment},
        message::{CreateMessage, Message, MessageMarker},
        notification::{CreateNotification, Notification, NotificationKind, NotificationMarker},
        post::{CreatePost, Post, PostContent, PostMarker, PostQuery},
        user::{CreateUser, Credentials, Profile, User, UserHandle, UserMarker},
    },
    snowflake::SnowflakeGenerator,
};
use sqlx::{PgConnection, PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use std::collections::{HashMap, HashSet};
use time::OffsetDateTime;
use tracing::{debug, info};

macro_rules! select_posts {
    ($($rest:literal),* $(,)?) => {
        concat!(
            "
            SELECT
                posts.post_snowflake,
                posts.title,
                posts.body,
                posts.published_at,
                posts.for_subscribers,
                (
                    SELECT COUNT(*) FROM posts.likes
                    WHERE likes.post_snowflake = posts.post_snowflake
                ) AS like_count,
                users.user_snowflake,
                users.handle
            FROM
                posts.posts
                JOIN users.users ON users.user_snowflake = posts.user_snowflake
            ",
            $($rest),*
        )
    };
}

macro_rules! select_comments {
    ($($rest:literal),* $(,)?) => {
        concat!(
            "
            SELECT
                comments.comment_snowflake,
                comments.post_snowflake,
                comments.text,
                comments.created_at,
                comments.approved,
                users.user_snowflake,
                users.handle
            FROM
                posts.comments
                JOIN users.users ON users.user_snowflake = comments.user_snowflake
            ",
            $($rest),*
        )
    };
}

macro_rules! select_messages {
    ($($rest:literal),* $(,)?) => {
        concat!(
            "
            SELECT
                messages.message_snowflake,
                messages.subject,
                messages.body,
                messages.sent_at,
                messages.is_read,
                messages.sender_snowflake,
                senders.handle AS sender_handle,
                messages.recipient_snowflake,
                recipients.handle AS recipient_handle
            FROM
                social.messages
                JOIN users.users AS senders
                    ON senders.user_snowflake = messages.sender_snowflake
                JOIN users.users AS recipients
                    ON recipients.user_snowflake = messages.recipient_snowflake
            ",
            $($rest),*
        )
    };
}

const NOTIFICATION_COLUMNS: &str = "
    notification_snowflake,
    recipient_snowflake,
    sender_snowflake,
    sender_name,
    kind,
    text,
    post_snowflake,
    created_at,
    is_new,
    viewed
";

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|error| error.is_unique_violation())
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|error| error.is_foreign_key_violation())
}

/// `%fragment%` for `ILIKE`, with the pattern characters in `fragment` escaped.
fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn to_db_ids<Marker>(ids: &[Id<Marker>]) -> Vec<i64> {
    ids.iter().copied().map(Id::to_db).collect()
}

fn to_count(count: i64) -> u64 {
    count.try_into().unwrap_or_default()
}

async fn check_categories(
    connection: &mut PgConnection,
    categories: &[Id<CategoryMarker>],
) -> Result<()> {
    if categories.is_empty() {
        return Ok(());
    }

    let existing: HashSet<i64> = query_scalar::<_, i64>(
        "
        SELECT category_snowflake FROM posts.categories
        WHERE category_snowflake = ANY($1)
        ",
    )
    .bind(to_db_ids(categories))
    .fetch_all(&mut *connection)
    .await?
    .into_iter()
    .collect();

    match categories
        .iter()
        .find(|category| !existing.contains(&category.to_db()))
    {
        Some(missing) => Err(DbError::UnknownCategory(*missing)),
        None => Ok(()),
    }
}

async fn insert_post_categories(
    connection: &mut PgConnection,
    post_id: Id<PostMarker>,
    categories: &[Id<CategoryMarker>],
) -> Result<()> {
    query(
        "
        INSERT INTO posts.post_categories (post_snowflake, category_snowflake)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(post_id.to_db())
    .bind(to_db_ids(categories))
    .execute(&mut *connection)
    .await?;

    Ok(())
}

/// A [`Store`] backed by Postgres.
pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<SnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, snowflake_generator: SnowflakeGenerator) -> Self {
        Self {
            pool,
            snowflake_generator: Mutex::new(snowflake_generator),
        }
    }

    pub async fn connect(url: &str, snowflake_generator: SnowflakeGenerator) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(url).await?;
        info!("Connected to database");

        Ok(Self::new(pool, snowflake_generator))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations are up to date");

        Ok(())
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        Ok(self.snowflake_generator.lock().generate()?.into())
    }

    async fn attach_categories(&self, records: Vec<PostRecord>) -> Result<Vec<Post>> {
        let post_ids: Vec<i64> = records.iter().map(|record| record.post_snowflake).collect();
        let category_records: Vec<PostCategoryRecord> = query_as(
            "
            SELECT
                post_categories.post_snowflake,
                categories.category_snowflake,
                categories.name,
                categories.slug,
                categories.description
            FROM
                posts.post_categories
                JOIN posts.categories
                    ON categories.category_snowflake = post_categories.category_snowflake
            WHERE
                post_categories.post_snowflake = ANY($1)
            ORDER BY
                categories.name
            ",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut categories: HashMap<i64, Vec<Category>> = HashMap::new();
        for record in category_records {
            categories
                .entry(record.post_snowflake)
                .or_default()
                .push(record.category.try_into()?);
        }

        records
            .into_iter()
            .map(|record| -> Result<Post> {
                let post_categories = categories
                    .remove(&record.post_snowflake)
                    .unwrap_or_default();
                Ok(record.into_post(post_categories)?)
            })
            .collect()
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let record: Option<CommentRecord> =
            query_as(select_comments!("WHERE comments.comment_snowflake = $1"))
                .bind(comment_id.to_db())
                .fetch_optional(&self.pool)
                .await?;

        Ok(record.map(Comment::try_from).transpose()?)
    }

    /// Removes the edge if present, inserts it otherwise.
    async fn toggle_post_edge(
        &self,
        delete_sql: &'static str,
        insert_sql: &'static str,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<bool> {
        let removed = query(delete_sql)
            .bind(post_id.to_db())
            .bind(user_id.to_db())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if removed > 0 {
            return Ok(false);
        }

        query(insert_sql)
            .bind(post_id.to_db())
            .bind(user_id.to_db())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                if is_foreign_key_violation(&error) {
                    DbError::UnknownPost(post_id)
                } else {
                    DbError::Sqlx(error)
                }
            })?;

        Ok(true)
    }
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id: Id<UserMarker> = self.next_id()?;

        let record: UserRecord = query_as(
            "
            INSERT INTO users.users
                (user_snowflake, handle, email, password_hash, bio, country, city)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING user_snowflake, handle
            ",
        )
        .bind(user_id.to_db())
        .bind(user.handle.get())
        .bind(user.email.get())
        .bind(user.password_hash.as_phc())
        .bind(&user.profile.bio)
        .bind(&user.profile.country)
        .bind(&user.profile.city)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                DbError::HandleTaken(user.handle.clone())
            } else {
                DbError::Sqlx(error)
            }
        })?;

        debug!(%user_id, "Created user");
        Ok(record.try_into()?)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record: Option<UserRecord> = query_as(
            "
            SELECT user_snowflake, handle FROM users.users
            WHERE user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let record: Option<UserRecord> = query_as(
            "
            SELECT user_snowflake, handle FROM users.users
            WHERE handle = $1
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    async fn fetch_credentials(&self, login: &str) -> Result<Option<Credentials>> {
        let by_handle: Option<CredentialsRecord> = query_as(
            "
            SELECT user_snowflake, handle, password_hash FROM users.users
            WHERE handle = $1
            ",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        let record = match by_handle {
            Some(record) => Some(record),
            None => {
                query_as(
                    "
                    SELECT user_snowflake, handle, password_hash FROM users.users
                    WHERE lower(email) = lower($1)
                    ORDER BY user_snowflake
                    LIMIT 1
                    ",
                )
                .bind(login)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(record.map(Credentials::try_from).transpose()?)
    }

    async fn fetch_users(&self) -> Result<Vec<User>> {
        let records: Vec<UserRecord> =
            query_as("SELECT user_snowflake, handle FROM users.users ORDER BY handle")
                .fetch_all(&self.pool)
                .await?;

        Ok(records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn search_user_handles(&self, fragment: &str, limit: usize) -> Result<Vec<UserHandle>> {
        let handles: Vec<String> = query_scalar(
            "
            SELECT handle FROM users.users
            WHERE handle ILIKE $1
            ORDER BY handle
            LIMIT $2
            ",
        )
        .bind(contains_pattern(fragment))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(handles
            .into_iter()
            .map(UserHandle::new)
            .collect::<Result<_, _>>()
            .map_err(ModelValidationError::from)?)
    }

    async fn fetch_profile(&self, user_id: Id<UserMarker>) -> Result<Option<Profile>> {
        let record: Option<ProfileRecord> = query_as(
            "
            SELECT bio, country, city FROM users.users
            WHERE user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Profile::from))
    }

    async fn update_profile(&self, user_id: Id<UserMarker>, profile: &Profile) -> Result<bool> {
        let updated = query(
            "
            UPDATE users.users SET bio = $2, country = $3, city = $4
            WHERE user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .bind(&profile.bio)
        .bind(&profile.country)
        .bind(&profile.city)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.as_bytes())
        .bind(authentication.user.to_db())
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|lifetime| lifetime.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record: Option<AuthenticationRecord> = query_as(
            "
            SELECT user_snowflake, token_hash, created_at, expires_after_seconds
            FROM users.authentications
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash.as_bytes())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Authentication::try_from).transpose()?)
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let deleted = query("DELETE FROM users.authentications WHERE token_hash = $1")
            .bind(token_hash.as_bytes())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn create_category(&self, category: &CreateCategory) -> Result<Category> {
        let category_id: Id<CategoryMarker> = self.next_id()?;
        let taken: HashSet<String> = query_scalar::<_, String>("SELECT slug FROM posts.categories")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .collect();
        let slug = unique_slug(&category.name, |candidate| taken.contains(candidate));

        let record: CategoryRecord = query_as(
            "
            INSERT INTO posts.categories (category_snowflake, name, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING category_snowflake, name, slug, description
            ",
        )
        .bind(category_id.to_db())
        .bind(category.name.get())
        .bind(&slug)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await?;

        debug!(%category_id, %slug, "Created category");
        Ok(record.try_into()?)
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>> {
        let records: Vec<CategoryRecord> = query_as(
            "
            SELECT category_snowflake, name, slug, description FROM posts.categories
            ORDER BY name
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Category::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn fetch_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let record: Option<CategoryRecord> = query_as(
            "
            SELECT category_snowflake, name, slug, description FROM posts.categories
            WHERE slug = $1
            ",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Category::try_from).transpose()?)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id: Id<PostMarker> = self.next_id()?;
        let mut transaction = self.pool.begin().await?;
        check_categories(&mut transaction, &post.content.categories).await?;

        query(
            "
            INSERT INTO posts.posts
                (post_snowflake, user_snowflake, title, body, published_at, for_subscribers)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(post_id.to_db())
        .bind(post.author.to_db())
        .bind(post.content.title.get())
        .bind(post.content.body.get())
        .bind(post.published_at)
        .bind(post.content.for_subscribers)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                DbError::UnknownUser(post.author)
            } else {
                DbError::Sqlx(error)
            }
        })?;
        insert_post_categories(&mut transaction, post_id, &post.content.categories).await?;
        transaction.commit().await?;

        debug!(%post_id, author = %post.author, "Created post");
        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::UnknownPost(post_id))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record: Option<PostRecord> = query_as(select_posts!("WHERE posts.post_snowflake = $1"))
            .bind(post_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        Ok(self
            .attach_categories(record.into_iter().collect())
            .await?
            .pop())
    }

    async fn fetch_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let records: Vec<PostRecord> = query_as(select_posts!(
            "
            WHERE
                ($1::BIGINT IS NULL OR posts.user_snowflake = $1)
                AND ($2::BIGINT IS NULL OR EXISTS (
                    SELECT 1 FROM posts.post_categories
                    WHERE post_categories.post_snowflake = posts.post_snowflake
                        AND post_categories.category_snowflake = $2
                ))
                AND ($3::TEXT IS NULL
                    OR posts.title ILIKE $3
                    OR posts.body ILIKE $3
                    OR users.handle ILIKE $3)
            ORDER BY
                posts.published_at DESC,
                posts.post_snowflake ASC
            "
        ))
        .bind(query.author.map(Id::to_db))
        .bind(query.category.map(Id::to_db))
        .bind(query.search.as_deref().map(contains_pattern))
        .fetch_all(&self.pool)
        .await?;

        self.attach_categories(records).await
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut transaction = self.pool.begin().await?;
        check_categories(&mut transaction, &content.categories).await?;

        let updated = query(
            "
            UPDATE posts.posts SET title = $2, body = $3, for_subscribers = $4
            WHERE post_snowflake = $1
            ",
        )
        .bind(post_id.to_db())
        .bind(content.title.get())
        .bind(content.body.get())
        .bind(content.for_subscribers)
        .execute(&mut *transaction)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(None);
        }

        query("DELETE FROM posts.post_categories WHERE post_snowflake = $1")
            .bind(post_id.to_db())
            .execute(&mut *transaction)
            .await?;
        insert_post_categories(&mut transaction, post_id, &content.categories).await?;
        transaction.commit().await?;

        self.fetch_post(post_id).await
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM posts.posts WHERE post_snowflake = $1")
            .bind(post_id.to_db())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn toggle_like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<bool> {
        self.toggle_post_edge(
            "DELETE FROM posts.likes WHERE post_snowflake = $1 AND user_snowflake = $2",
            "INSERT INTO posts.likes (post_snowflake, user_snowflake) VALUES ($1, $2)",
            post_id,
            user_id,
        )
        .await
    }

    async fn toggle_favorite(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<bool> {
        self.toggle_post_edge(
            "DELETE FROM posts.favorites WHERE post_snowflake = $1 AND user_snowflake = $2",
            "INSERT INTO posts.favorites (post_snowflake, user_snowflake) VALUES ($1, $2)",
            post_id,
            user_id,
        )
        .await
    }

    async fn fetch_favorite_posts(&self, user_id: Id<UserMarker>) -> Result<Vec<Post>> {
        let records: Vec<PostRecord> = query_as(select_posts!(
            "
            WHERE EXISTS (
                SELECT 1 FROM posts.favorites
                WHERE favorites.post_snowflake = posts.post_snowflake
                    AND favorites.user_snowflake = $1
            )
            ORDER BY
                posts.published_at DESC,
                posts.post_snowflake ASC
            "
        ))
        .bind(user_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        self.attach_categories(records).await
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment_id: Id<CommentMarker> = self.next_id()?;

        query(
            "
            INSERT INTO posts.comments
                (comment_snowflake, post_snowflake, user_snowflake, text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(comment_id.to_db())
        .bind(comment.post.to_db())
        .bind(comment.author.to_db())
        .bind(comment.text.get())
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                DbError::UnknownPost(comment.post)
            } else {
                DbError::Sqlx(error)
            }
        })?;

        self.fetch_comment(comment_id)
            .await?
            .ok_or(DbError::UnknownPost(comment.post))
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records: Vec<CommentRecord> = query_as(select_comments!(
            "
            WHERE comments.post_snowflake = $1 AND comments.approved
            ORDER BY
                comments.created_at DESC,
                comments.comment_snowflake DESC
            "
        ))
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn create_subscription(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let inserted = query(
            "
            INSERT INTO social.subscriptions (subscriber_snowflake, author_snowflake)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(subscriber.to_db())
        .bind(author.to_db())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                DbError::UnknownUser(author)
            } else {
                DbError::Sqlx(error)
            }
        })?
        .rows_affected();

        Ok(inserted > 0)
    }

    async fn delete_subscription(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let deleted = query(
            "
            DELETE FROM social.subscriptions
            WHERE subscriber_snowflake = $1 AND author_snowflake = $2
            ",
        )
        .bind(subscriber.to_db())
        .bind(author.to_db())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted > 0)
    }

    async fn is_subscribed(
        &self,
        subscriber: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let exists: bool = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM social.subscriptions
                WHERE subscriber_snowflake = $1 AND author_snowflake = $2
            )
            ",
        )
        .bind(subscriber.to_db())
        .bind(author.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn fetch_subscribed_authors(
        &self,
        subscriber: Id<UserMarker>,
    ) -> Result<Vec<Id<UserMarker>>> {
        let authors: Vec<i64> = query_scalar(
            "
            SELECT author_snowflake FROM social.subscriptions
            WHERE subscriber_snowflake = $1
            ",
        )
        .bind(subscriber.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(authors.into_iter().map(Id::from_db).collect())
    }

    async fn fetch_subscribers(&self, author: Id<UserMarker>) -> Result<Vec<User>> {
        let records: Vec<UserRecord> = query_as(
            "
            SELECT users.user_snowflake, users.handle
            FROM
                social.subscriptions
                JOIN users.users ON users.user_snowflake = subscriptions.subscriber_snowflake
            WHERE subscriptions.author_snowflake = $1
            ORDER BY users.handle
            ",
        )
        .bind(author.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn count_subscribers(&self, author: Id<UserMarker>) -> Result<u64> {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM social.subscriptions WHERE author_snowflake = $1")
                .bind(author.to_db())
                .fetch_one(&self.pool)
                .await?;

        Ok(to_count(count))
    }

    async fn create_notification(&self, notification: &CreateNotification) -> Result<Notification> {
        let notification_id: Id<NotificationMarker> = self.next_id()?;

        let record: NotificationRecord = query_as(&format!(
            "
            INSERT INTO social.notifications
                (notification_snowflake, recipient_snowflake, sender_snowflake, sender_name,
                 kind, text, post_snowflake, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {NOTIFICATION_COLUMNS}
            "
        ))
        .bind(notification_id.to_db())
        .bind(notification.recipient.to_db())
        .bind(notification.sender.map(Id::to_db))
        .bind(&notification.sender_name)
        .bind(notification.kind.as_str())
        .bind(&notification.text)
        .bind(notification.post.map(Id::to_db))
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                DbError::UnknownUser(notification.recipient)
            } else {
                DbError::Sqlx(error)
            }
        })?;

        Ok(record.try_into()?)
    }

    async fn notification_exists(
        &self,
        recipient: Id<UserMarker>,
        kind: NotificationKind,
        text: &str,
    ) -> Result<bool> {
        let exists: bool = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM social.notifications
                WHERE recipient_snowflake = $1 AND kind = $2 AND text = $3
            )
            ",
        )
        .bind(recipient.to_db())
        .bind(kind.as_str())
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn fetch_notification(
        &self,
        notification_id: Id<NotificationMarker>,
    ) -> Result<Option<Notification>> {
        let record: Option<NotificationRecord> = query_as(&format!(
            "
            SELECT {NOTIFICATION_COLUMNS} FROM social.notifications
            WHERE notification_snowflake = $1
            "
        ))
        .bind(notification_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Notification::try_from).transpose()?)
    }

    async fn fetch_new_notifications(
        &self,
        recipient: Id<UserMarker>,
    ) -> Result<Vec<Notification>> {
        let records: Vec<NotificationRecord> = query_as(&format!(
            "
            SELECT {NOTIFICATION_COLUMNS} FROM social.notifications
            WHERE recipient_snowflake = $1 AND is_new
            ORDER BY created_at DESC, notification_snowflake DESC
            "
        ))
        .bind(recipient.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Notification::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn count_unviewed_notifications(&self, recipient: Id<UserMarker>) -> Result<u64> {
        let count: i64 = query_scalar(
            "
            SELECT COUNT(*) FROM social.notifications
            WHERE recipient_snowflake = $1 AND NOT viewed
            ",
        )
        .bind(recipient.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(to_count(count))
    }

    async fn mark_notification_viewed(
        &self,
        notification_id: Id<NotificationMarker>,
    ) -> Result<bool> {
        let updated = query(
            "
            UPDATE social.notifications SET viewed = TRUE
            WHERE notification_snowflake = $1
            ",
        )
        .bind(notification_id.to_db())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    async fn mark_all_notifications_viewed(&self, recipient: Id<UserMarker>) -> Result<u64> {
        let updated = query(
            "
            UPDATE social.notifications SET viewed = TRUE
            WHERE recipient_snowflake = $1 AND NOT viewed
            ",
        )
        .bind(recipient.to_db())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }

    async fn delete_notification(&self, notification_id: Id<NotificationMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM social.notifications WHERE notification_snowflake = $1")
            .bind(notification_id.to_db())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn delete_all_notifications(&self, recipient: Id<UserMarker>) -> Result<u64> {
        let deleted = query("DELETE FROM social.notifications WHERE recipient_snowflake = $1")
            .bind(recipient.to_db())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn create_message(&self, message: &CreateMessage) -> Result<Message> {
        let message_id: Id<MessageMarker> = self.next_id()?;

        query(
            "
            INSERT INTO social.messages
                (message_snowflake, sender_snowflake, recipient_snowflake, subject, body, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(message_id.to_db())
        .bind(message.sender.to_db())
        .bind(message.recipient.to_db())
        .bind(message.subject.get())
        .bind(message.body.get())
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                DbError::UnknownUser(message.recipient)
            } else {
                DbError::Sqlx(error)
            }
        })?;

        debug!(%message_id, "Stored message");
        self.fetch_message(message_id)
            .await?
            .ok_or(DbError::UnknownUser(message.recipient))
    }

    async fn fetch_message(&self, message_id: Id<MessageMarker>) -> Result<Option<Message>> {
        let record: Option<MessageRecord> =
            query_as(select_messages!("WHERE messages.message_snowflake = $1"))
                .bind(message_id.to_db())
                .fetch_optional(&self.pool)
                .await?;

        Ok(record.map(Message::try_from).transpose()?)
    }

    async fn mark_message_read(&self, message_id: Id<MessageMarker>) -> Result<bool> {
        let updated =
            query("UPDATE social.messages SET is_read = TRUE WHERE message_snowflake = $1")
                .bind(message_id.to_db())
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(updated > 0)
    }

    async fn fetch_inbox(
        &self,
        recipient: Id<UserMarker>,
        sender: Option<&UserHandle>,
    ) -> Result<Vec<Message>> {
        let records: Vec<MessageRecord> = query_as(select_messages!(
            "
            WHERE
                messages.recipient_snowflake = $1
                AND ($2::TEXT IS NULL OR senders.handle = $2)
            ORDER BY
                messages.sent_at DESC,
                messages.message_snowflake DESC
            "
        ))
        .bind(recipient.to_db())
        .bind(sender.map(UserHandle::get))
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn fetch_sent_messages(&self, sender: Id<UserMarker>) -> Result<Vec<Message>> {
        let records: Vec<MessageRecord> = query_as(select_messages!(
            "
            WHERE messages.sender_snowflake = $1
            ORDER BY
                messages.sent_at DESC,
                messages.message_snowflake DESC
            "
        ))
        .bind(sender.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<_, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::contains_pattern;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(contains_pattern("ada"), "%ada%");
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
