use crate::{
    server::{
        Result, ServerError, ServerRouter, Settings,
        auth::AuthenticatedUser,
        extract::{Created, Json, PageQuery, Query},
    },
    social::feed::{load_viewer, visible_posts},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::{
    model::{
        category::{Category, CreateCategory},
        post::{Post, PostQuery},
    },
    page::Page,
};
use quill_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_categories)
        .typed_post(create_category)
        .typed_get(category_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/categories", rejection(ServerError))]
struct CategoriesPath();

async fn list_categories(
    CategoriesPath(): CategoriesPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<Category>>> {
    Ok(Json(store.fetch_categories().await?))
}

async fn create_category(
    CategoriesPath(): CategoriesPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(category): Json<CreateCategory>,
) -> Result<Created<Category>> {
    let category = store.create_category(&category).await?;

    info!(
        category_id = %category.id,
        slug = category.slug,
        by = %user.user_id(),
        "Created category"
    );
    Ok(Created(category))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/categories/{slug}/posts", rejection(ServerError))]
struct CategoryPostsPath {
    slug: String,
}

#[derive(Debug, Serialize)]
struct CategoryPosts {
    category: Category,
    posts: Page<Post>,
}

async fn category_posts(
    CategoryPostsPath { slug }: CategoryPostsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    viewer: Option<AuthenticatedUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryPosts>> {
    let category = store
        .fetch_category_by_slug(&slug)
        .await?
        .ok_or(ServerError::CategoryBySlugNotFound(slug))?;

    let viewer = load_viewer(&*store, viewer.as_ref().map(AuthenticatedUser::user)).await?;
    let posts = visible_posts(&*store, &viewer, &PostQuery::in_category(category.id)).await?;

    Ok(Json(CategoryPosts {
        category,
        posts: Page::paginate(posts, query.page(), settings.page_size),
    }))
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{app, send, sign_up};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn posts_are_listed_by_category_slug() {
        let app = app();
        let (_, alice) = sign_up(&app, "alice").await;

        let (status, category) = send(
            &app,
            Method::POST,
            "/categories",
            Some(&alice),
            Some(json!({ "name": "Rust & Systems" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(category["slug"], "rust-systems");

        let (_, duplicate) = send(
            &app,
            Method::POST,
            "/categories",
            Some(&alice),
            Some(json!({ "name": "Rust & Systems" })),
        )
        .await;
        assert_eq!(duplicate["slug"], "rust-systems-2");

        for (title, categories) in [("tagged", json!([category["id"]])), ("untagged", json!([]))] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/posts",
                Some(&alice),
                Some(json!({ "title": title, "body": "...", "categories": categories })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, listing) =
            send(&app, Method::GET, "/categories/rust-systems/posts", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing["category"]["name"], "Rust & Systems");
        assert_eq!(listing["posts"]["total_items"], 1);
        assert_eq!(listing["posts"]["items"][0]["title"], "tagged");

        let (status, _) = send(&app, Method::GET, "/categories/nope/posts", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::POST,
            "/posts",
            Some(&alice),
            Some(json!({ "title": "bad", "body": "...", "categories": [424242] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
