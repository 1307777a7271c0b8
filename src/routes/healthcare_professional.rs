use crate::auth::{ApprovedProfessional, AuthSession, SiteAdmin};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::healthcare_professional::{HealthcareProfessional, HealthcareProfessionalPatchRequest, HealthcareProfessionalRequest, MembershipPatchRequest};
use crate::models::hospital::HospitalSelection;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, patch, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

async fn ensure_hospital_exists(repo: &PostgresRepository, hospital_id: &Uuid) -> Result<(), AppError> {
    match repo.get_hospital(hospital_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound("Hospital not found".to_string())),
    }
}

/// The caller's own hospital membership
#[openapi(tag = "Healthcare Professional")]
#[get("/")]
pub async fn get_own_membership(pool: &State<PgPool>, _rate_limit: RateLimit, session: AuthSession) -> Result<Json<HealthcareProfessional>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let professional = repo
        .get_healthcare_professional(&session.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Healthcare professional not found".to_string()))?;
    Ok(Json(professional))
}

/// Register the caller as a professional. Joining an existing hospital needs
/// approval; founding a new one makes the caller its approved admin.
#[openapi(tag = "Healthcare Professional")]
#[post("/", data = "<payload>")]
pub async fn create_membership(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    session: AuthSession,
    payload: JsonBody<HealthcareProfessionalRequest>,
) -> Result<(Status, Json<HealthcareProfessional>), AppError> {
    payload.validate_all()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let professional = match &payload.hospital {
        HospitalSelection::Existing(existing) => {
            ensure_hospital_exists(&repo, &existing.id).await?;
            repo.create_member_of_existing_hospital(&session.user_id, &payload, &existing.id).await?
        }
        HospitalSelection::New(hospital) => {
            let (hospital, professional) = repo.create_member_with_new_hospital(&session.user_id, &payload, hospital).await?;
            info!(hospital_id = %hospital.id, user_id = %session.user_id, "hospital founded");
            professional
        }
    };

    Ok((Status::Created, Json(professional)))
}

/// Update the caller's role and default selections
#[openapi(tag = "Healthcare Professional")]
#[patch("/", data = "<payload>")]
pub async fn update_own_profile(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    payload: JsonBody<HealthcareProfessionalPatchRequest>,
) -> Result<Json<HealthcareProfessional>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let update = payload.apply(&approved.professional);
    let professional = repo.update_professional_profile(&approved.user_id(), &update).await?;
    Ok(Json(professional))
}

/// Move the caller to another hospital
#[openapi(tag = "Healthcare Professional")]
#[patch("/hospital", data = "<payload>")]
pub async fn change_hospital(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    approved: ApprovedProfessional,
    payload: JsonBody<HospitalSelection>,
) -> Result<Json<HealthcareProfessional>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let professional = match &*payload {
        HospitalSelection::Existing(existing) => {
            ensure_hospital_exists(&repo, &existing.id).await?;
            repo.move_to_existing_hospital(&approved.user_id(), &existing.id).await?
        }
        HospitalSelection::New(hospital) => repo.move_to_new_hospital(&approved.user_id(), hospital).await?.1,
    };

    info!(user_id = %professional.user_id, hospital_id = %professional.hospital_id, "professional changed hospital");
    Ok(Json(professional))
}

/// Set the approved / admin flags of any membership
#[openapi(tag = "Healthcare Professional")]
#[patch("/<user_id>", data = "<payload>")]
pub async fn set_membership_flags(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    admin: SiteAdmin,
    user_id: &str,
    payload: JsonBody<MembershipPatchRequest>,
) -> Result<Json<HealthcareProfessional>, AppError> {
    let user_id = Uuid::parse_str(user_id)?;
    if payload.is_empty() {
        return Err(AppError::wrong_arguments());
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let professional = repo.set_membership_flags(&user_id, &payload, None).await?;
    info!(target_user = %user_id, by = %admin.user.id, "membership flags changed");
    Ok(Json(professional))
}

/// Delete any membership
#[openapi(tag = "Healthcare Professional")]
#[delete("/<user_id>")]
pub async fn delete_membership(pool: &State<PgPool>, _rate_limit: RateLimit, admin: SiteAdmin, user_id: &str) -> Result<Status, AppError> {
    let user_id = Uuid::parse_str(user_id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.delete_professional(&user_id).await?;
    info!(target_user = %user_id, by = %admin.user.id, "membership deleted");
    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        get_own_membership,
        create_membership,
        update_own_profile,
        change_hospital,
        set_membership_flags,
        delete_membership
    ]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{bearer, create_country, create_professional, create_user, test_client, test_config, test_repository, unique_code};
    use rocket::http::{ContentType, Status};
    use serde_json::{Value, json};

    #[rocket::async_test]
    async fn anonymous_caller_is_unauthorized() {
        let client = test_client(test_config()).await;
        let response = client.get("/api/healthcare_professional").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn founding_a_hospital_makes_an_approved_admin() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;
        let user = create_user(&repo, false).await;
        let country_id = create_country(&repo).await;

        let response = client
            .post("/api/healthcare_professional")
            .header(bearer(&repo, &user.id).await)
            .header(ContentType::JSON)
            .body(
                json!({
                    "name": "Dr. Lee",
                    "country_id": country_id,
                    "role": "ophthalmologist",
                    "hospital": {"name": "Lee Eye Clinic", "country_id": country_id, "code": unique_code()}
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["approved"], true);
        assert_eq!(body["is_admin"], true);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn joining_unknown_hospital_is_not_found() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;
        let user = create_user(&repo, false).await;
        let country_id = create_country(&repo).await;

        let response = client
            .post("/api/healthcare_professional")
            .header(bearer(&repo, &user.id).await)
            .header(ContentType::JSON)
            .body(
                json!({
                    "name": "Dr. Lee",
                    "country_id": country_id,
                    "role": "optometrist",
                    "hospital": {"id": uuid::Uuid::new_v4()}
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn membership_flags_require_site_admin() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;
        let member = create_user(&repo, false).await;
        create_professional(&repo, &member.id, None, false, false).await;
        let plain = create_user(&repo, false).await;
        let admin = create_user(&repo, true).await;
        let path = format!("/api/healthcare_professional/{}", member.id);

        let response = client
            .patch(path.clone())
            .header(bearer(&repo, &plain.id).await)
            .header(ContentType::JSON)
            .body(json!({"approved": true}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .patch(path.clone())
            .header(bearer(&repo, &admin.id).await)
            .header(ContentType::JSON)
            .body(json!({}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .patch(path)
            .header(bearer(&repo, &admin.id).await)
            .header(ContentType::JSON)
            .body(json!({"approved": true}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["approved"], true);
    }
}
