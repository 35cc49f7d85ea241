use crate::server::{ServerError, ServerRouter, Settings, SiteInfo, extract::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;

mod accounts;
mod categories;
mod messages;
mod notifications;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_site)
        .merge(accounts::routes())
        .merge(categories::routes())
        .merge(messages::routes())
        .merge(notifications::routes())
        .merge(posts::routes())
        .merge(users::routes())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/site", rejection(ServerError))]
struct SitePath();

async fn get_site(SitePath(): SitePath, State(settings): State<Arc<Settings>>) -> Json<SiteInfo> {
    Json(settings.site.clone())
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{app, send};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn site_info_and_unknown_routes() {
        let app = app();

        let (status, site) = send(&app, Method::GET, "/site", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(site["title"], "Quill");
        assert_eq!(site["header"], "Writing, together");

        let (status, body) = send(&app, Method::GET, "/nowhere", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }
}
