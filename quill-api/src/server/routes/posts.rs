use crate::{
    server::{
        Result, ServerError, ServerRouter, Settings,
        auth::AuthenticatedUser,
        extract::{Created, Json, PageQuery, Query},
    },
    social::{
        fanout::{Event, fan_out},
        feed::{load_viewer, visible_post, visible_posts},
    },
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::{
    model::{
        Id,
        comment::{Comment, CommentText, CreateComment},
        post::{CreatePost, Post, PostContent, PostMarker, PostQuery},
    },
    page::Page,
    visibility::{Viewer, filter_visible_posts},
};
use quill_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
        .typed_get(list_comments)
        .typed_post(create_comment)
        .typed_post(toggle_like)
        .typed_post(toggle_favorite)
        .typed_get(my_posts)
        .typed_get(my_favorites)
}

/// The post `viewer` asked for, if it exists and is visible to them.
async fn find_visible_post(
    store: &dyn Store,
    viewer: &Viewer,
    post_id: Id<PostMarker>,
) -> Result<Post> {
    visible_post(store, viewer, post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))
}

/// The post `user` wants to change, if they wrote it.
async fn find_own_post(
    store: &dyn Store,
    user: &AuthenticatedUser,
    post_id: Id<PostMarker>,
) -> Result<Post> {
    let post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    if post.author.id == user.user_id() {
        Ok(post)
    } else {
        Err(ServerError::NotPostAuthor(post_id))
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(Clone, Debug, Default, Deserialize)]
struct FeedQuery {
    page: Option<String>,
    /// Search text. Blank means everything.
    q: Option<String>,
}

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    viewer: Option<AuthenticatedUser>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Page<Post>>> {
    let viewer = load_viewer(&*store, viewer.as_ref().map(AuthenticatedUser::user)).await?;
    let post_query = query
        .q
        .as_deref()
        .map(PostQuery::search)
        .unwrap_or_default();
    let posts = visible_posts(&*store, &viewer, &post_query).await?;

    Ok(Json(Page::paginate(
        posts,
        query.page.as_deref(),
        settings.page_size,
    )))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(content): Json<PostContent>,
) -> Result<Created<Post>> {
    let post = store
        .create_post(&CreatePost {
            author: user.user_id(),
            content,
            published_at: OffsetDateTime::now_utc(),
        })
        .await?;
    info!(post_id = %post.id, author = %post.author.id, "Published post");

    fan_out(&*store, user.user(), Event::PostPublished(&post)).await?;

    Ok(Created(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

#[derive(Debug, Serialize)]
struct PostDetail {
    post: Post,
    comments: Vec<Comment>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<PostDetail>> {
    let viewer = load_viewer(&*store, viewer.as_ref().map(AuthenticatedUser::user)).await?;
    let post = find_visible_post(&*store, &viewer, id).await?;
    let comments = store.fetch_comments(id).await?;

    Ok(Json(PostDetail { post, comments }))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(content): Json<PostContent>,
) -> Result<Json<Post>> {
    find_own_post(&*store, &user, id).await?;
    let post = store
        .update_post(id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    find_own_post(&*store, &user, id).await?;
    store.delete_post(id).await?;

    info!(post_id = %id, "Deleted post");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    text: CommentText,
}

async fn list_comments(
    PostCommentsPath { id }: PostCommentsPath,
    State(store): State<Arc<dyn Store>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Vec<Comment>>> {
    let viewer = load_viewer(&*store, viewer.as_ref().map(AuthenticatedUser::user)).await?;
    find_visible_post(&*store, &viewer, id).await?;

    Ok(Json(store.fetch_comments(id).await?))
}

async fn create_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<CommentForm>,
) -> Result<Created<Comment>> {
    let viewer = load_viewer(&*store, Some(user.user())).await?;
    let post = find_visible_post(&*store, &viewer, id).await?;

    let comment = store
        .create_comment(&CreateComment {
            post: id,
            author: user.user_id(),
            text: form.text,
        })
        .await?;
    fan_out(
        &*store,
        user.user(),
        Event::CommentCreated {
            post: &post,
            comment: &comment,
        },
    )
    .await?;

    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct PostLikePath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LikeState {
    liked: bool,
    like_count: u64,
}

async fn toggle_like(
    PostLikePath { id }: PostLikePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeState>> {
    let viewer = load_viewer(&*store, Some(user.user())).await?;
    find_visible_post(&*store, &viewer, id).await?;

    let liked = store.toggle_like(id, user.user_id()).await?;
    let like_count = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?
        .like_count;

    Ok(Json(LikeState { liked, like_count }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/favorite", rejection(ServerError))]
struct PostFavoritePath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FavoriteState {
    favorited: bool,
}

async fn toggle_favorite(
    PostFavoritePath { id }: PostFavoritePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<FavoriteState>> {
    let viewer = load_viewer(&*store, Some(user.user())).await?;
    find_visible_post(&*store, &viewer, id).await?;

    let favorited = store.toggle_favorite(id, user.user_id()).await?;
    Ok(Json(FavoriteState { favorited }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/me/posts", rejection(ServerError))]
struct MyPostsPath();

async fn my_posts(
    MyPostsPath(): MyPostsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    user: AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Post>>> {
    let posts = store
        .fetch_posts(&PostQuery::by_author(user.user_id()))
        .await?;

    Ok(Json(Page::paginate(posts, query.page(), settings.page_size)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/me/favorites", rejection(ServerError))]
struct MyFavoritesPath();

async fn my_favorites(
    MyFavoritesPath(): MyFavoritesPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Post>>> {
    let viewer = load_viewer(&*store, Some(user.user())).await?;
    let favorites = store.fetch_favorite_posts(user.user_id()).await?;

    Ok(Json(filter_visible_posts(&viewer, favorites)))
}
