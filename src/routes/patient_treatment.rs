use crate::auth::{ApprovedProfessional, ensure_hospital_access};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::patient_treatment::{PatientTreatment, PatientTreatmentPatchRequest, PatientTreatmentRequest, PatientTreatmentResponse};
use chrono::NaiveDate;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, patch, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;

fn ensure_chronological(start_date: NaiveDate, end_date: Option<NaiveDate>) -> Result<(), AppError> {
    match end_date {
        Some(end_date) if end_date < start_date => Err(AppError::wrong_arguments()),
        _ => Ok(()),
    }
}

/// Loads a treatment whose patient belongs to the caller's hospital.
async fn owned_treatment(repo: &PostgresRepository, approved: &ApprovedProfessional, id: &Uuid) -> Result<PatientTreatment, AppError> {
    let treatment = repo
        .get_patient_treatment(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient treatment not found".to_string()))?;
    let patient_hospital = repo.get_patient_hospital_id(&treatment.patient_id).await?;
    ensure_hospital_access(patient_hospital, approved.hospital_id(), "Patient")?;
    Ok(treatment)
}

#[openapi(tag = "Patient Treatment")]
#[post("/", data = "<payload>")]
pub async fn create_patient_treatment(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    payload: JsonBody<PatientTreatmentRequest>,
) -> Result<(Status, Json<PatientTreatmentResponse>), AppError> {
    ensure_chronological(payload.start_date, payload.end_date)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient_hospital = repo.get_patient_hospital_id(&payload.patient_id).await?;
    ensure_hospital_access(patient_hospital, approved.hospital_id(), "Patient")?;

    let treatment = repo.create_patient_treatment(&payload).await?;
    Ok((Status::Created, Json(PatientTreatmentResponse::from(&treatment))))
}

/// Change the treatment, its start, or its end. A `null` end date marks it ongoing.
#[openapi(tag = "Patient Treatment")]
#[patch("/<id>", data = "<payload>")]
pub async fn update_patient_treatment(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    id: &str,
    payload: JsonBody<PatientTreatmentPatchRequest>,
) -> Result<Json<PatientTreatmentResponse>, AppError> {
    let id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let current = owned_treatment(&repo, &approved, &id).await?;
    let merged = payload.apply(&current);
    ensure_chronological(merged.start_date, merged.end_date)?;

    let treatment = repo.update_patient_treatment(&merged).await?;
    Ok(Json(PatientTreatmentResponse::from(&treatment)))
}

#[openapi(tag = "Patient Treatment")]
#[delete("/<id>")]
pub async fn delete_patient_treatment(pool: &State<PgPool>, _rate_limit: RateLimit, approved: ApprovedProfessional, id: &str) -> Result<Status, AppError> {
    let id = Uuid::parse_str(id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    owned_treatment(&repo, &approved, &id).await?;
    repo.delete_patient_treatment(&id).await?;
    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![create_patient_treatment, update_patient_treatment, delete_patient_treatment]
}
