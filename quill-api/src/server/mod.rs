use crate::social;
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use extract::Json;
use quill_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenDecodeError, AuthTokenHashError},
        message::MessageMarker,
        notification::NotificationMarker,
        post::PostMarker,
        user::{PasswordHashError, UserHandle},
    },
    util::PositiveDuration,
};
use quill_db::store::{DbError, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
mod extract;
mod routes;

pub type ServerRouter = Router<ServerState>;

/// Title and header shown by clients, fixed at startup.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct SiteInfo {
    pub title: String,
    pub header: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Settings {
    pub site: SiteInfo,
    pub page_size: usize,
    pub token_lifetime: Option<PositiveDuration>,
}

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub settings: Arc<Settings>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Login or password was wrong")]
    InvalidCredentials,
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Submitted data was invalid: {0}")]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Social(social::Error),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User {} was not found.", .0.get())]
    UserByHandleNotFound(UserHandle),
    #[error("Category {0} was not found.")]
    CategoryBySlugNotFound(String),
    #[error("Message with id {0} was not found.")]
    MessageByIdNotFound(Id<MessageMarker>),
    #[error("Notification with id {0} was not found.")]
    NotificationByIdNotFound(Id<NotificationMarker>),
    #[error("Only the author may change post {0}")]
    NotPostAuthor(Id<PostMarker>),
    #[error("Only {} may edit this profile", .0.get())]
    NotProfileOwner(UserHandle),
    #[error("Message {0} belongs to other users")]
    NotMessageParticipant(Id<MessageMarker>),
    #[error("Notification {0} belongs to another user")]
    NotNotificationRecipient(Id<NotificationMarker>),
}

/// Storage failures found inside the social layer surface as plain
/// [`ServerError::Database`] so they get the same status mapping.
impl From<social::Error> for ServerError {
    fn from(value: social::Error) -> Self {
        match value {
            social::Error::Store(error) => ServerError::Database(error),
            other => ServerError::Social(other),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByHandleNotFound(_)
            | ServerError::CategoryBySlugNotFound(_)
            | ServerError::MessageByIdNotFound(_)
            | ServerError::NotificationByIdNotFound(_)
            | ServerError::Database(DbError::UnknownUser(_) | DbError::UnknownPost(_)) => {
                StatusCode::NOT_FOUND
            }
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::NotPostAuthor(_)
            | ServerError::NotProfileOwner(_)
            | ServerError::NotMessageParticipant(_)
            | ServerError::NotNotificationRecipient(_) => StatusCode::FORBIDDEN,
            ServerError::Database(DbError::HandleTaken(_)) => StatusCode::CONFLICT,
            ServerError::Validation(_) | ServerError::Database(DbError::UnknownCategory(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServerError::JsonRejection(rejection) => rejection.status(),
            ServerError::QueryRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::Social(error) => error.status(),
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::server::{ServerState, Settings, SiteInfo, routes};
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use quill_common::{snowflake::SnowflakeGenerator, util::PositiveDuration};
    use quill_db::memory::MemoryStore;
    use serde_json::Value;
    use std::sync::Arc;
    use time::Duration;
    use tower::ServiceExt;

    pub fn app() -> Router {
        let state = ServerState {
            store: Arc::new(MemoryStore::new(SnowflakeGenerator::new(0, 0).unwrap())),
            settings: Arc::new(Settings {
                site: SiteInfo {
                    title: "Quill".to_owned(),
                    header: "Writing, together".to_owned(),
                },
                page_size: 5,
                token_lifetime: PositiveDuration::new(Duration::hours(1)),
            }),
        };
        routes().with_state(state)
    }

    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    /// Registers `handle` and returns its id and a bearer token.
    pub async fn sign_up(app: &Router, handle: &str) -> (u64, String) {
        let (status, user) = send(
            app,
            Method::POST,
            "/accounts/register",
            None,
            Some(serde_json::json!({
                "handle": handle,
                "email": format!("{handle}@example.org"),
                "password": "correct horse battery",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{user}");

        let (status, login) = send(
            app,
            Method::POST,
            "/accounts/login",
            None,
            Some(serde_json::json!({
                "login": handle,
                "password": "correct horse battery",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{login}");

        (
            user["id"].as_u64().unwrap(),
            login["token"].as_str().unwrap().to_owned(),
        )
    }
}
