use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::patient_k::{PatientKRequest, PatientKRow};
use uuid::Uuid;

impl PostgresRepository {
    pub async fn list_patient_k(&self, patient_id: &Uuid) -> Result<Vec<PatientKRow>, AppError> {
        let rows = sqlx::query_as::<_, PatientKRow>("SELECT patient_id, k_type, od, os FROM patient_k WHERE patient_id = $1 ORDER BY k_type")
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    pub async fn upsert_patient_k(&self, request: &PatientKRequest) -> Result<PatientKRow, AppError> {
        let row = sqlx::query_as::<_, PatientKRow>(
            r#"
            INSERT INTO patient_k (patient_id, k_type, od, os)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (patient_id, k_type) DO UPDATE
            SET od = EXCLUDED.od, os = EXCLUDED.os
            RETURNING patient_id, k_type, od, os
            "#,
        )
        .bind(request.patient_id)
        .bind(request.k_type.as_str())
        .bind(request.od)
        .bind(request.os)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
