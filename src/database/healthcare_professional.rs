use crate::database::hospital::insert_hospital;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::healthcare_professional::{HealthcareProfessional, HealthcareProfessionalRequest, MembershipPatchRequest, ProfileUpdate};
use crate::models::hospital::{Hospital, NewHospitalRequest};
use uuid::Uuid;

const PROFESSIONAL_COLUMNS: &str = "user_id, name, country_id, hospital_id, role, approved, is_admin, default_ethnicity_id, default_instrument_id, created_at";

impl PostgresRepository {
    pub async fn get_healthcare_professional(&self, user_id: &Uuid) -> Result<Option<HealthcareProfessional>, AppError> {
        let professional = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            "SELECT {PROFESSIONAL_COLUMNS} FROM healthcare_professional WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(professional)
    }

    pub async fn list_hospital_members(&self, hospital_id: &Uuid) -> Result<Vec<HealthcareProfessional>, AppError> {
        let members = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            "SELECT {PROFESSIONAL_COLUMNS} FROM healthcare_professional WHERE hospital_id = $1 ORDER BY created_at, user_id"
        ))
        .bind(hospital_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    /// Joins an existing hospital as an unapproved, non-admin member.
    pub async fn create_member_of_existing_hospital(
        &self,
        user_id: &Uuid,
        request: &HealthcareProfessionalRequest,
        hospital_id: &Uuid,
    ) -> Result<HealthcareProfessional, AppError> {
        let professional = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            r#"
            INSERT INTO healthcare_professional
                (user_id, name, country_id, hospital_id, role, approved, is_admin, default_ethnicity_id, default_instrument_id)
            VALUES ($1, $2, $3, $4, $5, false, false, $6, $7)
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&request.name)
        .bind(request.country_id)
        .bind(hospital_id)
        .bind(&request.role)
        .bind(request.default_ethnicity_id)
        .bind(request.default_instrument_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(professional)
    }

    /// Creates the hospital and its first member, who is approved and admin.
    /// Both rows are written or neither is.
    pub async fn create_member_with_new_hospital(
        &self,
        user_id: &Uuid,
        request: &HealthcareProfessionalRequest,
        hospital: &NewHospitalRequest,
    ) -> Result<(Hospital, HealthcareProfessional), AppError> {
        let mut tx = self.pool.begin().await?;

        let hospital = insert_hospital(&mut *tx, hospital).await?;
        let professional = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            r#"
            INSERT INTO healthcare_professional
                (user_id, name, country_id, hospital_id, role, approved, is_admin, default_ethnicity_id, default_instrument_id)
            VALUES ($1, $2, $3, $4, $5, true, true, $6, $7)
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&request.name)
        .bind(request.country_id)
        .bind(hospital.id)
        .bind(&request.role)
        .bind(request.default_ethnicity_id)
        .bind(request.default_instrument_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((hospital, professional))
    }

    pub async fn update_professional_profile(&self, user_id: &Uuid, update: &ProfileUpdate) -> Result<HealthcareProfessional, AppError> {
        let professional = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            r#"
            UPDATE healthcare_professional
            SET role = $1, default_ethnicity_id = $2, default_instrument_id = $3
            WHERE user_id = $4
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(&update.role)
        .bind(update.default_ethnicity_id)
        .bind(update.default_instrument_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(professional)
    }

    /// Moves the member to another existing hospital. Approval and admin
    /// rights do not carry over.
    pub async fn move_to_existing_hospital(&self, user_id: &Uuid, hospital_id: &Uuid) -> Result<HealthcareProfessional, AppError> {
        let professional = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            r#"
            UPDATE healthcare_professional
            SET hospital_id = $1, approved = false, is_admin = false
            WHERE user_id = $2
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(hospital_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(professional)
    }

    /// Creates a hospital and moves the member into it as its approved admin.
    pub async fn move_to_new_hospital(
        &self,
        user_id: &Uuid,
        hospital: &NewHospitalRequest,
    ) -> Result<(Hospital, HealthcareProfessional), AppError> {
        let mut tx = self.pool.begin().await?;

        let hospital = insert_hospital(&mut *tx, hospital).await?;
        let professional = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            r#"
            UPDATE healthcare_professional
            SET hospital_id = $1, approved = true, is_admin = true
            WHERE user_id = $2
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(hospital.id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((hospital, professional))
    }

    /// Applies approval/admin flags. When `hospital_id` is given the update
    /// only touches a member of that hospital.
    pub async fn set_membership_flags(
        &self,
        user_id: &Uuid,
        patch: &MembershipPatchRequest,
        hospital_id: Option<&Uuid>,
    ) -> Result<HealthcareProfessional, AppError> {
        let professional = sqlx::query_as::<_, HealthcareProfessional>(&format!(
            r#"
            UPDATE healthcare_professional
            SET approved = COALESCE($1, approved), is_admin = COALESCE($2, is_admin)
            WHERE user_id = $3 AND ($4::uuid IS NULL OR hospital_id = $4)
            RETURNING {PROFESSIONAL_COLUMNS}
            "#
        ))
        .bind(patch.approved)
        .bind(patch.is_admin)
        .bind(user_id)
        .bind(hospital_id.copied())
        .fetch_optional(&self.pool)
        .await?;

        professional.ok_or_else(|| AppError::NotFound("Healthcare professional not found".to_string()))
    }

    pub async fn delete_professional(&self, user_id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM healthcare_professional WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Healthcare professional not found".to_string()));
        }
        Ok(())
    }

    /// Removes a non-admin member of the given hospital. Returns false when no
    /// row matched those conditions.
    pub async fn delete_hospital_member(&self, user_id: &Uuid, hospital_id: &Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM healthcare_professional WHERE user_id = $1 AND hospital_id = $2 AND is_admin = false")
            .bind(user_id)
            .bind(hospital_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hospital::{ExistingHospitalRequest, HospitalSelection};
    use crate::test_utils::{create_country, create_user, test_repository, unique_code};

    fn request(country_id: Uuid, hospital: HospitalSelection) -> HealthcareProfessionalRequest {
        HealthcareProfessionalRequest {
            name: "Dr. Park".to_string(),
            country_id,
            hospital,
            role: "ophthalmologist".to_string(),
            default_ethnicity_id: None,
            default_instrument_id: None,
        }
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn new_hospital_member_is_approved_admin() {
        let repo = test_repository().await;
        let country = create_country(&repo).await;
        let user = create_user(&repo, false).await;
        let new_hospital = NewHospitalRequest {
            name: "Myopia Clinic".to_string(),
            country_id: country,
            code: unique_code(),
        };
        let req = request(country, HospitalSelection::New(new_hospital.clone()));

        let (hospital, professional) = repo.create_member_with_new_hospital(&user.id, &req, &new_hospital).await.unwrap();
        assert_eq!(professional.hospital_id, hospital.id);
        assert!(professional.approved);
        assert!(professional.is_admin);

        let joiner = create_user(&repo, false).await;
        let req = request(country, HospitalSelection::Existing(ExistingHospitalRequest { id: hospital.id }));
        let member = repo.create_member_of_existing_hospital(&joiner.id, &req, &hospital.id).await.unwrap();
        assert!(!member.approved);
        assert!(!member.is_admin);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn failed_membership_insert_rolls_back_hospital() {
        let repo = test_repository().await;
        let country = create_country(&repo).await;
        let new_hospital = NewHospitalRequest {
            name: "Orphan Clinic".to_string(),
            country_id: country,
            code: unique_code(),
        };
        // No such user: the membership insert violates its foreign key.
        let ghost = Uuid::new_v4();
        let req = request(country, HospitalSelection::New(new_hospital.clone()));
        assert!(repo.create_member_with_new_hospital(&ghost, &req, &new_hospital).await.is_err());

        let orphans: i64 = sqlx::query_scalar("SELECT count(*) FROM hospital WHERE code = $1")
            .bind(&new_hospital.code)
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
