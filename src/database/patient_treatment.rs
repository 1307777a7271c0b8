use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::patient_treatment::{PatientTreatment, PatientTreatmentRequest};
use uuid::Uuid;

const TREATMENT_COLUMNS: &str = "id, patient_id, treatment_id, start_date, end_date";

impl PostgresRepository {
    pub async fn list_patient_treatments(&self, patient_id: &Uuid) -> Result<Vec<PatientTreatment>, AppError> {
        let treatments = sqlx::query_as::<_, PatientTreatment>(&format!(
            "SELECT {TREATMENT_COLUMNS} FROM patient_treatment WHERE patient_id = $1 ORDER BY start_date"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(treatments)
    }

    pub async fn get_patient_treatment(&self, id: &Uuid) -> Result<Option<PatientTreatment>, AppError> {
        let treatment = sqlx::query_as::<_, PatientTreatment>(&format!("SELECT {TREATMENT_COLUMNS} FROM patient_treatment WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(treatment)
    }

    pub async fn create_patient_treatment(&self, request: &PatientTreatmentRequest) -> Result<PatientTreatment, AppError> {
        let treatment = sqlx::query_as::<_, PatientTreatment>(&format!(
            r#"
            INSERT INTO patient_treatment (patient_id, treatment_id, start_date, end_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {TREATMENT_COLUMNS}
            "#
        ))
        .bind(request.patient_id)
        .bind(request.treatment_id)
        .bind(request.start_date)
        .bind(request.end_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(treatment)
    }

    /// Writes every mutable column of an already-merged treatment.
    pub async fn update_patient_treatment(&self, treatment: &PatientTreatment) -> Result<PatientTreatment, AppError> {
        let updated = sqlx::query_as::<_, PatientTreatment>(&format!(
            r#"
            UPDATE patient_treatment
            SET treatment_id = $1, start_date = $2, end_date = $3
            WHERE id = $4
            RETURNING {TREATMENT_COLUMNS}
            "#
        ))
        .bind(treatment.treatment_id)
        .bind(treatment.start_date)
        .bind(treatment.end_date)
        .bind(treatment.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient treatment not found".to_string()))?;

        Ok(updated)
    }

    pub async fn delete_patient_treatment(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM patient_treatment WHERE id = $1").bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Patient treatment not found".to_string()));
        }
        Ok(())
    }
}
