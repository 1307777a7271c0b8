use crate::auth::AuthSession;
use crate::database::postgres_repository::PostgresRepository;
use crate::encryption::FieldCipher;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::patient::{PatientLinkRequest, PatientResponse};
use crate::service::patient::PatientService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Patients the caller follows
#[openapi(tag = "User")]
#[get("/patient")]
pub async fn list_linked_patients(
    pool: &State<PgPool>,
    cipher: &State<FieldCipher>,
    _rate_limit: RateLimit,
    session: AuthSession,
) -> Result<Json<Vec<PatientResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(PatientService::new(&repo, cipher).linked(&session.user_id).await?))
}

/// Follow a patient by proving the hospital, registration number and date of birth
#[openapi(tag = "User")]
#[post("/patient", data = "<payload>")]
pub async fn link_patient(
    pool: &State<PgPool>,
    cipher: &State<FieldCipher>,
    _rate_limit: RateLimit,
    session: AuthSession,
    payload: JsonBody<PatientLinkRequest>,
) -> Result<Status, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient_id = PatientService::new(&repo, cipher).link(&session.user_id, &payload).await?;
    info!(user_id = %session.user_id, patient_id = %patient_id, "patient linked");
    Ok(Status::Created)
}

/// Stop following a patient
#[openapi(tag = "User")]
#[delete("/patient/<patient_id>")]
pub async fn unlink_patient(pool: &State<PgPool>, _rate_limit: RateLimit, session: AuthSession, patient_id: &str) -> Result<Status, AppError> {
    let patient_id = Uuid::parse_str(patient_id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.unlink_patient(&session.user_id, &patient_id).await?;
    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_linked_patients, link_patient, unlink_patient]
}
