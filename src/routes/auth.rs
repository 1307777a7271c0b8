use crate::auth::AuthSession;
use crate::config::{OAuthConfig, SessionConfig};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::{AuthRateLimit, RateLimit};
use crate::models::session::Session;
use crate::models::user::{OAuthTokenRequest, PasswordAuthRequest, PasswordLoginRequest, PasswordUpdateRequest};
use crate::service::oauth::IdentityVerifier;
use chrono::Duration;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, post, put};
use rocket_okapi::openapi;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

fn session_ttl(config: &SessionConfig) -> Duration {
    Duration::seconds(config.ttl_seconds)
}

/// Exchange a username and password for a session key
#[openapi(tag = "Auth")]
#[post("/passwordLogin", data = "<payload>")]
pub async fn password_login(
    pool: &State<PgPool>,
    session_config: &State<SessionConfig>,
    _rate_limit: AuthRateLimit,
    payload: JsonBody<PasswordLoginRequest>,
) -> Result<Json<Session>, AppError> {
    if !payload.is_complete() {
        return Err(AppError::wrong_arguments());
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let Some(auth) = repo.get_password_auth(&payload.username).await? else {
        PostgresRepository::dummy_verify(&payload.password);
        return Err(AppError::InvalidCredentials);
    };
    PostgresRepository::verify_password(&auth, &payload.password)?;

    let session = repo.create_session(&auth.user_id, session_ttl(session_config)).await?;
    info!(user_id = %auth.user_id, "password login");
    Ok(Json(session))
}

/// Exchange a federated ID token for a session key, creating the user on first login
#[openapi(tag = "Auth")]
#[post("/oauthLogin", data = "<payload>")]
pub async fn oauth_login(
    pool: &State<PgPool>,
    http: &State<reqwest::Client>,
    oauth_config: &State<OAuthConfig>,
    session_config: &State<SessionConfig>,
    _rate_limit: AuthRateLimit,
    payload: JsonBody<OAuthTokenRequest>,
) -> Result<Json<Session>, AppError> {
    payload.validate()?;

    let identity = IdentityVerifier::new(http, oauth_config).verify(&payload.id_token).await?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = match repo.find_user_by_identity(&identity).await? {
        Some(user) => user,
        None => {
            let user = repo.create_oauth_user(&identity).await?;
            info!(user_id = %user.id, provider = %identity.provider, "user created from federated identity");
            user
        }
    };

    let session = repo.create_session(&user.id, session_ttl(session_config)).await?;
    Ok(Json(session))
}

/// Register a new user with a password credential
#[openapi(tag = "Auth")]
#[post("/user/passwordAuth", data = "<payload>")]
pub async fn create_password_user(pool: &State<PgPool>, _rate_limit: AuthRateLimit, payload: JsonBody<PasswordAuthRequest>) -> Result<Status, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = repo.create_password_user(&payload.username, &payload.password).await?;
    info!(user_id = %user.id, "user registered");
    Ok(Status::Created)
}

/// Replace the caller's own password
#[openapi(tag = "Auth")]
#[put("/user/<user_id>/passwordAuth", data = "<payload>")]
pub async fn update_password(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    session: AuthSession,
    user_id: &str,
    payload: JsonBody<PasswordUpdateRequest>,
) -> Result<Status, AppError> {
    let user_id = Uuid::parse_str(user_id)?;
    if user_id != session.user_id {
        return Err(AppError::Forbidden);
    }
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.update_password(&user_id, &payload.password).await?;
    Ok(Status::Ok)
}

/// Attach a federated credential to the caller
#[openapi(tag = "Auth")]
#[post("/user/oauth", data = "<payload>")]
pub async fn link_oauth(
    pool: &State<PgPool>,
    http: &State<reqwest::Client>,
    oauth_config: &State<OAuthConfig>,
    _rate_limit: RateLimit,
    session: AuthSession,
    payload: JsonBody<OAuthTokenRequest>,
) -> Result<Status, AppError> {
    payload.validate()?;

    let identity = IdentityVerifier::new(http, oauth_config).verify(&payload.id_token).await?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.link_oauth(&session.user_id, &identity).await?;
    Ok(Status::Created)
}

/// Remove the caller's federated credential unless it is their last one
#[openapi(tag = "Auth")]
#[delete("/user/oauth")]
pub async fn unlink_oauth(pool: &State<PgPool>, _rate_limit: RateLimit, session: AuthSession) -> Result<Status, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.unlink_oauth(&session.user_id).await?;
    Ok(Status::Ok)
}

/// End the current session
#[openapi(tag = "Auth")]
#[post("/logout")]
pub async fn logout(pool: &State<PgPool>, _rate_limit: RateLimit, session: AuthSession) -> Result<Status, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.delete_session(&session.session_id).await?;
    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![password_login, oauth_login, create_password_user, update_password, link_oauth, unlink_oauth, logout]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bearer, create_user, test_client, test_config, test_repository, unique_name};
    use rocket::http::{ContentType, Header, Status};
    use serde_json::{Value, json};

    #[rocket::async_test]
    async fn login_with_empty_fields_is_bad_request() {
        let client = test_client(test_config()).await;
        let response = client
            .post("/api/auth/passwordLogin")
            .header(ContentType::JSON)
            .body(json!({"username": "", "password": "x"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post("/api/auth/passwordLogin")
            .header(ContentType::JSON)
            .body(json!({"username": "doctor"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn register_login_and_logout() {
        let client = test_client(test_config()).await;
        let username = unique_name("login");

        let response = client
            .post("/api/auth/user/passwordAuth")
            .header(ContentType::JSON)
            .body(json!({"username": username, "password": "correct horse"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);

        let response = client
            .post("/api/auth/passwordLogin")
            .header(ContentType::JSON)
            .body(json!({"username": username, "password": "wrong horse"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .post("/api/auth/passwordLogin")
            .header(ContentType::JSON)
            .body(json!({"username": username, "password": "correct horse"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let session: Value = response.into_json().await.unwrap();
        let bearer = Header::new("Authorization", format!("Bearer {}", session["session_key"].as_str().unwrap()));

        let response = client.post("/api/auth/logout").header(bearer.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let response = client.post("/api/auth/logout").header(bearer).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn password_update_is_self_only() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;
        let username = unique_name("self");
        let user = repo.create_password_user(&username, "first password").await.unwrap();
        let other = repo.create_password_user(&unique_name("other"), "first password").await.unwrap();
        let session = repo.create_session(&user.id, chrono::Duration::hours(1)).await.unwrap();
        let bearer = Header::new("Authorization", format!("Bearer {}", session.session_key));

        let response = client
            .put(format!("/api/auth/user/{}/passwordAuth", other.id))
            .header(bearer.clone())
            .header(ContentType::JSON)
            .body(json!({"password": "another password"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .put(format!("/api/auth/user/{}/passwordAuth", user.id))
            .header(bearer)
            .header(ContentType::JSON)
            .body(json!({"password": "another password"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let credential = repo.get_password_auth(&username).await.unwrap().unwrap();
        assert!(PostgresRepository::verify_password(&credential, "another password").is_ok());
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn password_update_without_password_credential_is_not_found() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;
        let user = create_user(&repo, false).await;

        let response = client
            .put(format!("/api/auth/user/{}/passwordAuth", user.id))
            .header(bearer(&repo, &user.id).await)
            .header(ContentType::JSON)
            .body(json!({"password": "another password"}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
