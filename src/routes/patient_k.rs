use crate::auth::{ApprovedProfessional, ensure_hospital_access};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::patient_k::{PatientKRequest, PatientKResponse};
use rocket::serde::json::Json;
use rocket::{State, put};
use rocket_okapi::openapi;
use sqlx::PgPool;

/// Store the K1 or K2 reading of a patient, replacing any earlier one
#[openapi(tag = "Patient K")]
#[put("/", data = "<payload>")]
pub async fn put_patient_k(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    payload: JsonBody<PatientKRequest>,
) -> Result<Json<PatientKResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient_hospital = repo.get_patient_hospital_id(&payload.patient_id).await?;
    ensure_hospital_access(patient_hospital, approved.hospital_id(), "Patient")?;

    let row = repo.upsert_patient_k(&payload).await?;
    Ok(Json(PatientKResponse::try_from(row).map_err(AppError::integrity)?))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![put_patient_k]
}
