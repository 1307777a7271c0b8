use crate::config::TrackingConfig;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::middleware::{ClientIp, UserAgent};
use crate::models::page_view::{TrackRequest, VisitStats};
use crate::service::tracking::{local_day_start, visitor_hash};
use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;

async fn current_stats(repo: &PostgresRepository, config: &TrackingConfig) -> Result<VisitStats, AppError> {
    repo.visit_stats(local_day_start(Utc::now(), config.tz())).await
}

/// Count a page view and return the updated totals
#[openapi(tag = "Tracking")]
#[post("/track", data = "<payload>")]
pub async fn track(
    pool: &State<PgPool>,
    config: &State<TrackingConfig>,
    _rate_limit: RateLimit,
    client_ip: ClientIp,
    user_agent: UserAgent,
    payload: JsonBody<TrackRequest>,
) -> Result<Json<VisitStats>, AppError> {
    let user_agent = user_agent.0.unwrap_or_default();
    let ip_hash = visitor_hash(&client_ip.0, &user_agent, &config.visitor_salt);

    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.record_page_view(payload.path_or_root(), &user_agent, &ip_hash).await?;
    Ok(Json(current_stats(&repo, config).await?))
}

/// Visits today (local time) and overall
#[openapi(tag = "Tracking")]
#[get("/stats")]
pub async fn stats(pool: &State<PgPool>, config: &State<TrackingConfig>, _rate_limit: RateLimit) -> Result<Json<VisitStats>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(current_stats(&repo, config).await?))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![track, stats]
}
