use crate::auth::{ApprovedProfessional, ensure_hospital_access};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::measurement::{MeasurementRequest, MeasurementResponse};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Record an axial-length measurement for a patient of the caller's hospital
#[openapi(tag = "Measurement")]
#[post("/", data = "<payload>")]
pub async fn create_measurement(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    payload: JsonBody<MeasurementRequest>,
) -> Result<(Status, Json<MeasurementResponse>), AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient_hospital = repo.get_patient_hospital_id(&payload.patient_id).await?;
    ensure_hospital_access(patient_hospital, approved.hospital_id(), "Patient")?;

    let measurement = repo.create_measurement(&payload, &approved.user_id()).await?;
    Ok((Status::Created, Json(MeasurementResponse::from(&measurement))))
}

#[openapi(tag = "Measurement")]
#[delete("/<id>")]
pub async fn delete_measurement(pool: &State<PgPool>, _rate_limit: RateLimit, approved: ApprovedProfessional, id: &str) -> Result<Status, AppError> {
    let id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let measurement = repo
        .get_measurement(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Measurement not found".to_string()))?;
    let patient_hospital = repo.get_patient_hospital_id(&measurement.patient_id).await?;
    ensure_hospital_access(patient_hospital, approved.hospital_id(), "Patient")?;

    repo.delete_measurement(&id).await?;
    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![create_measurement, delete_measurement]
}
