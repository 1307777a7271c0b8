use crate::auth::{ApprovedProfessional, AuthSession, HospitalAdmin, ensure_hospital_access};
use crate::database::postgres_repository::PostgresRepository;
use crate::encryption::FieldCipher;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::patient::{
    DeletionRequest, OrderDirection, PatientCreateRequest, PatientDetailResponse, PatientOrderBy, PatientPatchRequest, PatientResponse,
    PendingDeletionResponse,
};
use crate::service::patient::PatientService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, patch, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

fn parse_order_by(value: Option<&str>) -> Result<PatientOrderBy, AppError> {
    match value {
        None => Ok(PatientOrderBy::CreatedAt),
        Some(value) => value.parse().map_err(|_| AppError::wrong_arguments()),
    }
}

/// Patients of the caller's hospital, decrypted and sorted
#[openapi(tag = "Patient")]
#[get("/?<orderBy>&<orderByDirection>")]
#[allow(non_snake_case)]
pub async fn list_patients(
    pool: &State<PgPool>,
    cipher: &State<FieldCipher>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    orderBy: Option<String>,
    orderByDirection: Option<String>,
) -> Result<Json<Vec<PatientResponse>>, AppError> {
    let order_by = parse_order_by(orderBy.as_deref())?;
    let direction = OrderDirection::parse_lenient(orderByDirection.as_deref());

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patients = PatientService::new(&repo, cipher).list_for_hospital(&approved.hospital_id(), order_by, direction).await?;
    Ok(Json(patients))
}

/// Pending deletion requests of the admin's hospital
#[openapi(tag = "Patient")]
#[get("/deleteRequest")]
pub async fn list_deletion_requests(
    pool: &State<PgPool>,
    cipher: &State<FieldCipher>,
    _rate_limit: RateLimit,
    admin: HospitalAdmin,
) -> Result<Json<Vec<PendingDeletionResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let pending = PatientService::new(&repo, cipher).pending_deletions(&admin.hospital_id()).await?;
    Ok(Json(pending))
}

/// Ask the hospital admin to delete a patient. Repeating the request
/// refreshes it.
#[openapi(tag = "Patient")]
#[post("/deleteRequest", data = "<payload>")]
pub async fn request_deletion(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    payload: JsonBody<DeletionRequest>,
) -> Result<Status, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient_hospital = repo.get_patient_hospital_id(&payload.patient_id).await?;
    ensure_hospital_access(patient_hospital, approved.hospital_id(), "Patient")?;

    repo.upsert_deletion_request(&payload.patient_id, &approved.user_id()).await?;
    info!(patient_id = %payload.patient_id, requested_by = %approved.user_id(), "patient deletion requested");
    Ok(Status::Created)
}

/// Delete the patient behind a pending request
#[openapi(tag = "Patient")]
#[post("/deleteRequest/<patient_id>/approve")]
pub async fn approve_deletion(pool: &State<PgPool>, _rate_limit: RateLimit, admin: HospitalAdmin, patient_id: &str) -> Result<Status, AppError> {
    let patient_id = Uuid::parse_str(patient_id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient_hospital = repo.get_patient_hospital_id(&patient_id).await?;
    ensure_hospital_access(patient_hospital, admin.hospital_id(), "Patient")?;

    repo.approve_deletion(&patient_id).await?;
    info!(patient_id = %patient_id, approved_by = %admin.user_id(), "patient deleted on request");
    Ok(Status::Ok)
}

/// Drop a pending request and keep the patient
#[openapi(tag = "Patient")]
#[post("/deleteRequest/<patient_id>/reject")]
pub async fn reject_deletion(pool: &State<PgPool>, _rate_limit: RateLimit, admin: HospitalAdmin, patient_id: &str) -> Result<Status, AppError> {
    let patient_id = Uuid::parse_str(patient_id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient_hospital = repo.get_patient_hospital_id(&patient_id).await?;
    ensure_hospital_access(patient_hospital, admin.hospital_id(), "Patient")?;

    repo.reject_deletion(&patient_id).await?;
    info!(patient_id = %patient_id, rejected_by = %admin.user_id(), "patient deletion rejected");
    Ok(Status::Ok)
}

/// Full record of one patient with its measurements, treatments and K values
#[openapi(tag = "Patient")]
#[get("/<patient_id>")]
pub async fn get_patient(
    pool: &State<PgPool>,
    cipher: &State<FieldCipher>,
    _rate_limit: RateLimit,
    session: AuthSession,
    patient_id: &str,
) -> Result<Json<PatientDetailResponse>, AppError> {
    let patient_id = Uuid::parse_str(patient_id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = PatientService::new(&repo, cipher).detail(&patient_id, &session.user_id).await?;
    Ok(Json(detail))
}

/// Register a patient in the caller's hospital
#[openapi(tag = "Patient")]
#[post("/", data = "<payload>")]
pub async fn create_patient(
    pool: &State<PgPool>,
    cipher: &State<FieldCipher>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    payload: JsonBody<PatientCreateRequest>,
) -> Result<(Status, Json<PatientResponse>), AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient = PatientService::new(&repo, cipher)
        .create(&payload, approved.hospital_id(), approved.user_id())
        .await?;
    info!(patient_id = %patient.id, hospital_id = %patient.hospital_id, "patient registered");
    Ok((Status::Created, Json(patient)))
}

/// Correct a patient's date of birth or sex
#[openapi(tag = "Patient")]
#[patch("/<patient_id>", data = "<payload>")]
pub async fn update_patient(
    pool: &State<PgPool>,
    cipher: &State<FieldCipher>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    patient_id: &str,
    payload: JsonBody<PatientPatchRequest>,
) -> Result<Json<PatientResponse>, AppError> {
    let patient_id = Uuid::parse_str(patient_id)?;
    if payload.is_empty() {
        return Err(AppError::wrong_arguments());
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let patient = PatientService::new(&repo, cipher).update(&patient_id, &payload, approved.hospital_id()).await?;
    Ok(Json(patient))
}

/// Delete a patient outright
#[openapi(tag = "Patient")]
#[delete("/<patient_id>")]
pub async fn delete_patient(pool: &State<PgPool>, _rate_limit: RateLimit, admin: HospitalAdmin, patient_id: &str) -> Result<Status, AppError> {
    let patient_id = Uuid::parse_str(patient_id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    if !repo.delete_patient_in_hospital(&patient_id, &admin.hospital_id()).await? {
        return Err(AppError::NotFound("Patient not found".to_string()));
    }
    info!(patient_id = %patient_id, deleted_by = %admin.user_id(), "patient deleted");
    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        list_patients,
        list_deletion_requests,
        request_deletion,
        approve_deletion,
        reject_deletion,
        get_patient,
        create_patient,
        update_patient,
        delete_patient
    ]
}
