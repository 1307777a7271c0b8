use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::patient::PendingDeletionRow;
use uuid::Uuid;

impl PostgresRepository {
    /// Records (or re-records) a deletion request for the patient.
    pub async fn upsert_deletion_request(&self, patient_id: &Uuid, requested_by: &Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO pending_patient_deletion (patient_id, requested_by)
            VALUES ($1, $2)
            ON CONFLICT (patient_id) DO UPDATE
            SET requested_by = EXCLUDED.requested_by, created_at = now()
            "#,
        )
        .bind(patient_id)
        .bind(requested_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_pending_deletions(&self, hospital_id: &Uuid) -> Result<Vec<PendingDeletionRow>, AppError> {
        let rows = sqlx::query_as::<_, PendingDeletionRow>(
            r#"
            SELECT d.patient_id, d.requested_by, d.created_at, hp.name AS requester_name
            FROM pending_patient_deletion d
            JOIN patient p ON p.id = d.patient_id
            LEFT JOIN healthcare_professional hp ON hp.user_id = d.requested_by
            WHERE p.hospital_id = $1
            ORDER BY d.created_at DESC
            "#,
        )
        .bind(hospital_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn pending_deletion_exists(&self, patient_id: &Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM pending_patient_deletion WHERE patient_id = $1)")
            .bind(patient_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Deletes the pending request and then the patient. Both rows go or
    /// neither does.
    pub async fn approve_deletion(&self, patient_id: &Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let pending = sqlx::query("DELETE FROM pending_patient_deletion WHERE patient_id = $1")
            .bind(patient_id)
            .execute(&mut *tx)
            .await?;
        if pending.rows_affected() == 0 {
            return Err(AppError::NotFound("Deletion request not found".to_string()));
        }

        let patient = sqlx::query("DELETE FROM patient WHERE id = $1")
            .bind(patient_id)
            .execute(&mut *tx)
            .await?;
        if patient.rows_affected() == 0 {
            return Err(AppError::NotFound("Patient not found".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn reject_deletion(&self, patient_id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM pending_patient_deletion WHERE patient_id = $1")
            .bind(patient_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Deletion request not found".to_string()));
        }
        Ok(())
    }
}
