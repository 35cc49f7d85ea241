use crate::{
    server::{
        Result, ServerError, ServerRouter, Settings,
        auth::AuthenticatedUser,
        extract::{Json, PageQuery, Query},
    },
    social::{
        feed::{load_viewer, visible_posts},
        subscription::{subscribe, toggle_subscription, unsubscribe},
    },
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::{
    model::{
        ModelValidationError,
        post::{Post, PostQuery},
        user::{Profile, User, UserHandle},
    },
    page::Page,
};
use quill_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Most handles offered while typing a recipient.
const SUGGESTION_LIMIT: usize = 5;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_users)
        .typed_get(handle_suggestions)
        .typed_get(get_profile)
        .typed_put(update_profile)
        .typed_get(user_posts)
        .typed_get(list_subscribers)
        .typed_post(create_subscription)
        .typed_delete(delete_subscription)
        .typed_post(flip_subscription)
}

async fn user_by_handle(store: &dyn Store, handle: UserHandle) -> Result<User> {
    store
        .fetch_user_by_handle(&handle)
        .await?
        .ok_or(ServerError::UserByHandleNotFound(handle))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct UsersPath();

async fn list_users(
    UsersPath(): UsersPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<User>>> {
    Ok(Json(store.fetch_users().await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/suggestions", rejection(ServerError))]
struct SuggestionsPath();

#[derive(Clone, Debug, Default, Deserialize)]
struct SuggestionQuery {
    #[serde(default)]
    q: String,
}

async fn handle_suggestions(
    SuggestionsPath(): SuggestionsPath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<Vec<UserHandle>>> {
    let fragment = query.q.trim();
    if fragment.is_empty() {
        return Ok(Json(Vec::new()));
    }

    Ok(Json(
        store
            .search_user_handles(fragment, SUGGESTION_LIMIT)
            .await?,
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}", rejection(ServerError))]
struct UserPath {
    handle: UserHandle,
}

#[derive(Debug, Serialize)]
struct ProfileView {
    user: User,
    profile: Profile,
    subscriber_count: u64,
    /// Whether the viewer subscribes to this user. Always `false` anonymously.
    subscribed: bool,
    posts: Page<Post>,
}

async fn get_profile(
    UserPath { handle }: UserPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    viewer: Option<AuthenticatedUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileView>> {
    let user = user_by_handle(&*store, handle).await?;
    let profile = store.fetch_profile(user.id).await?.unwrap_or_default();
    let subscriber_count = store.count_subscribers(user.id).await?;

    let viewer = load_viewer(&*store, viewer.as_ref().map(AuthenticatedUser::user)).await?;
    let subscribed = match viewer.id() {
        Some(viewer_id) => store.is_subscribed(viewer_id, user.id).await?,
        None => false,
    };
    let posts = visible_posts(&*store, &viewer, &PostQuery::by_author(user.id)).await?;

    Ok(Json(ProfileView {
        user,
        profile,
        subscriber_count,
        subscribed,
        posts: Page::paginate(posts, query.page(), settings.page_size),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}/profile", rejection(ServerError))]
struct UserProfilePath {
    handle: UserHandle,
}

async fn update_profile(
    UserProfilePath { handle }: UserProfilePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(profile): Json<Profile>,
) -> Result<Json<Profile>> {
    if user.user().handle != handle {
        return Err(ServerError::NotProfileOwner(handle));
    }
    profile.validate().map_err(ModelValidationError::from)?;

    store.update_profile(user.user_id(), &profile).await?;

    info!(user_id = %user.user_id(), "Updated profile");
    Ok(Json(profile))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}/posts", rejection(ServerError))]
struct UserPostsPath {
    handle: UserHandle,
}

async fn user_posts(
    UserPostsPath { handle }: UserPostsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    viewer: Option<AuthenticatedUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Post>>> {
    let author = user_by_handle(&*store, handle).await?;
    let viewer = load_viewer(&*store, viewer.as_ref().map(AuthenticatedUser::user)).await?;
    let posts = visible_posts(&*store, &viewer, &PostQuery::by_author(author.id)).await?;

    Ok(Json(Page::paginate(posts, query.page(), settings.page_size)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}/subscribers", rejection(ServerError))]
struct SubscribersPath {
    handle: UserHandle,
}

async fn list_subscribers(
    SubscribersPath { handle }: SubscribersPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<User>>> {
    let author = user_by_handle(&*store, handle).await?;

    Ok(Json(store.fetch_subscribers(author.id).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}/subscription", rejection(ServerError))]
struct SubscriptionPath {
    handle: UserHandle,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct SubscriptionChange {
    subscribed: bool,
    /// `false` when the request left things as they were.
    changed: bool,
}

async fn create_subscription(
    SubscriptionPath { handle }: SubscriptionPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<SubscriptionChange>> {
    let author = user_by_handle(&*store, handle).await?;
    let created = subscribe(&*store, user.user(), &author).await?;

    Ok(Json(SubscriptionChange {
        subscribed: true,
        changed: created,
    }))
}

async fn delete_subscription(
    SubscriptionPath { handle }: SubscriptionPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<SubscriptionChange>> {
    let author = user_by_handle(&*store, handle).await?;
    let removed = unsubscribe(&*store, user.user(), &author).await?;

    Ok(Json(SubscriptionChange {
        subscribed: false,
        changed: removed,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{handle}/subscription/toggle", rejection(ServerError))]
struct SubscriptionTogglePath {
    handle: UserHandle,
}

async fn flip_subscription(
    SubscriptionTogglePath { handle }: SubscriptionTogglePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<SubscriptionChange>> {
    let author = user_by_handle(&*store, handle).await?;
    let subscribed = toggle_subscription(&*store, user.user(), author.id).await?;

    Ok(Json(SubscriptionChange {
        subscribed,
        changed: true,
    }))
}
