use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::AuthenticatedUser,
    extract::{Created, Json},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use quill_common::model::{
    ModelValidationError,
    auth::{AuthToken, Authentication},
    user::{CreateUser, EmailAddress, Password, Profile, User, UserHandle},
};
use quill_db::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/register", rejection(ServerError))]
struct RegisterPath();

#[derive(Debug, Deserialize)]
struct Registration {
    handle: UserHandle,
    email: EmailAddress,
    password: Password,
    #[serde(default)]
    profile: Profile,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(store): State<Arc<dyn Store>>,
    Json(registration): Json<Registration>,
) -> Result<Created<User>> {
    registration
        .password
        .validate()
        .map_err(ModelValidationError::from)?;
    registration
        .profile
        .validate()
        .map_err(ModelValidationError::from)?;

    let user = store
        .create_user(&CreateUser {
            handle: registration.handle,
            email: registration.email,
            password_hash: registration.password.hash()?,
            profile: registration.profile,
        })
        .await?;

    info!(user_id = %user.id, handle = %user.handle, "Registered user");
    Ok(Created(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/login", rejection(ServerError))]
struct LoginPath();

#[derive(Debug, Deserialize)]
struct Login {
    /// Handle or email address.
    login: String,
    password: Password,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user: User,
    #[serde(with = "time::serde::rfc3339::option")]
    expires_at: Option<OffsetDateTime>,
}

async fn login(
    LoginPath(): LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    Json(login): Json<Login>,
) -> Result<Json<LoginResponse>> {
    let credentials = store
        .fetch_credentials(login.login.trim())
        .await?
        .ok_or(ServerError::InvalidCredentials)?;
    if !login.password.matches(&credentials.password_hash) {
        return Err(ServerError::InvalidCredentials);
    }

    let token = AuthToken::generate(credentials.user.id);
    let authentication = Authentication {
        user: credentials.user.id,
        token_hash: token.hash()?,
        created_at: OffsetDateTime::now_utc(),
        expires_after: settings.token_lifetime,
    };
    store.create_auth(&authentication).await?;

    info!(user_id = %credentials.user.id, "Issued auth token");
    Ok(Json(LoginResponse {
        token: token.as_token_str(),
        expires_at: authentication
            .expires_after
            .map(|lifetime| authentication.created_at + lifetime.get()),
        user: credentials.user,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/accounts/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    store.delete_auth(user.token_hash()).await?;

    info!(user_id = %user.user_id(), "Revoked auth token");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::{app, send, sign_up};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn register_login_logout() {
        let app = app();
        let (user_id, token) = sign_up(&app, "ada").await;

        let (status, me) = send(&app, Method::GET, "/me/posts", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK, "{me}");

        let (status, _) = send(&app, Method::POST, "/accounts/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::GET, "/me/posts", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, login) = send(
            &app,
            Method::POST,
            "/accounts/login",
            None,
            Some(json!({ "login": "ada@example.org", "password": "correct horse battery" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(login["user"]["id"].as_u64(), Some(user_id));
    }

    #[tokio::test]
    async fn registration_is_validated() {
        let app = app();
        sign_up(&app, "ada").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/accounts/register",
            None,
            Some(json!({ "handle": "ada", "email": "ada2@example.org", "password": "long enough" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Method::POST,
            "/accounts/register",
            None,
            Some(json!({ "handle": "bob", "email": "bob@example.org", "password": "short" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            Method::POST,
            "/accounts/login",
            None,
            Some(json!({ "login": "ada", "password": "wrong password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_tokens_are_rejected() {
        let app = app();

        let (status, _) = send(&app, Method::GET, "/me/posts", Some("not-a-token"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/me/posts", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
