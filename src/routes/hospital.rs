use crate::auth::HospitalAdmin;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::rate_limit::RateLimit;
use crate::models::healthcare_professional::{HealthcareProfessional, MembershipPatchRequest};
use crate::models::hospital::HospitalWithCountryResponse;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, patch};
use rocket_okapi::openapi;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Loads a member the admin is about to act on. Members of other hospitals are
/// 403, unknown users 404.
async fn member_of_own_hospital(repo: &PostgresRepository, admin: &HospitalAdmin, user_id: &Uuid) -> Result<HealthcareProfessional, AppError> {
    let member = repo
        .get_healthcare_professional(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Healthcare professional not found".to_string()))?;
    if member.hospital_id != admin.hospital_id() {
        return Err(AppError::Forbidden);
    }
    Ok(member)
}

/// All hospitals with their country
#[openapi(tag = "Hospital")]
#[get("/")]
pub async fn list_hospitals(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<HospitalWithCountryResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let hospitals = repo.list_hospitals().await?.into_iter().map(HospitalWithCountryResponse::from).collect();
    Ok(Json(hospitals))
}

/// Members of the admin's own hospital
#[openapi(tag = "Hospital")]
#[get("/member")]
pub async fn list_members(pool: &State<PgPool>, _rate_limit: RateLimit, admin: HospitalAdmin) -> Result<Json<Vec<HealthcareProfessional>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(repo.list_hospital_members(&admin.hospital_id()).await?))
}

/// Approve or promote a member of the admin's own hospital
#[openapi(tag = "Hospital")]
#[patch("/member/<user_id>", data = "<payload>")]
pub async fn update_member(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    admin: HospitalAdmin,
    user_id: &str,
    payload: JsonBody<MembershipPatchRequest>,
) -> Result<Json<HealthcareProfessional>, AppError> {
    let user_id = Uuid::parse_str(user_id)?;
    if payload.is_empty() {
        return Err(AppError::wrong_arguments());
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    member_of_own_hospital(&repo, &admin, &user_id).await?;
    let hospital_id = admin.hospital_id();
    let member = repo.set_membership_flags(&user_id, &payload, Some(&hospital_id)).await?;
    info!(target_user = %user_id, hospital_id = %hospital_id, approved = member.approved, is_admin = member.is_admin, "member updated");
    Ok(Json(member))
}

/// Remove a non-admin member of the admin's own hospital
#[openapi(tag = "Hospital")]
#[delete("/member/<user_id>")]
pub async fn delete_member(pool: &State<PgPool>, _rate_limit: RateLimit, admin: HospitalAdmin, user_id: &str) -> Result<Status, AppError> {
    let user_id = Uuid::parse_str(user_id)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let member = member_of_own_hospital(&repo, &admin, &user_id).await?;
    if member.is_admin {
        return Err(AppError::Forbidden);
    }

    // The row can change between the read and the delete; the delete re-checks both conditions.
    if !repo.delete_hospital_member(&user_id, &admin.hospital_id()).await? {
        return Err(AppError::Forbidden);
    }
    info!(target_user = %user_id, hospital_id = %admin.hospital_id(), "member removed");
    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_hospitals, list_members, update_member, delete_member]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{bearer, create_hospital, create_professional, create_user, test_client, test_config, test_repository};
    use rocket::http::{ContentType, Status};
    use serde_json::json;

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn member_deletion_stays_inside_own_hospital() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;

        let own_hospital = create_hospital(&repo).await;
        let other_hospital = create_hospital(&repo).await;
        let admin = create_user(&repo, false).await;
        create_professional(&repo, &admin.id, Some(own_hospital), true, true).await;
        let fellow_admin = create_user(&repo, false).await;
        create_professional(&repo, &fellow_admin.id, Some(own_hospital), true, true).await;
        let outsider = create_user(&repo, false).await;
        create_professional(&repo, &outsider.id, Some(other_hospital), true, false).await;
        let member = create_user(&repo, false).await;
        create_professional(&repo, &member.id, Some(own_hospital), false, false).await;
        let auth = bearer(&repo, &admin.id).await;

        let response = client.delete(format!("/api/hospital/member/{}", outsider.id)).header(auth.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client.delete(format!("/api/hospital/member/{}", fellow_admin.id)).header(auth.clone()).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client.delete(format!("/api/hospital/member/{}", uuid::Uuid::new_v4())).header(auth.clone()).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.delete(format!("/api/hospital/member/{}", member.id)).header(auth).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert!(repo.get_healthcare_professional(&member.id).await.unwrap().is_none());
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn approving_member_of_other_hospital_is_forbidden() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;

        let own_hospital = create_hospital(&repo).await;
        let other_hospital = create_hospital(&repo).await;
        let admin = create_user(&repo, false).await;
        create_professional(&repo, &admin.id, Some(own_hospital), true, true).await;
        let outsider = create_user(&repo, false).await;
        create_professional(&repo, &outsider.id, Some(other_hospital), false, false).await;
        let pending = create_user(&repo, false).await;
        create_professional(&repo, &pending.id, Some(own_hospital), false, false).await;
        let auth = bearer(&repo, &admin.id).await;

        let response = client
            .patch(format!("/api/hospital/member/{}", outsider.id))
            .header(auth.clone())
            .header(ContentType::JSON)
            .body(json!({"approved": true}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .patch(format!("/api/hospital/member/{}", pending.id))
            .header(auth)
            .header(ContentType::JSON)
            .body(json!({"approved": true}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert!(repo.get_healthcare_professional(&pending.id).await.unwrap().unwrap().approved);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn non_admin_cannot_list_members() {
        let repo = test_repository().await;
        let client = test_client(test_config()).await;
        let hospital = create_hospital(&repo).await;
        let user = create_user(&repo, false).await;
        create_professional(&repo, &user.id, Some(hospital), true, false).await;

        let response = client.get("/api/hospital/member").header(bearer(&repo, &user.id).await).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
