use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::measurement::{Measurement, MeasurementRequest};
use uuid::Uuid;

const MEASUREMENT_COLUMNS: &str = "id, patient_id, date, instrument_id, od, os, creator_id, created_at";

impl PostgresRepository {
    pub async fn list_measurements(&self, patient_id: &Uuid) -> Result<Vec<Measurement>, AppError> {
        let measurements = sqlx::query_as::<_, Measurement>(&format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM measurement WHERE patient_id = $1 ORDER BY date, created_at"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(measurements)
    }

    pub async fn get_measurement(&self, id: &Uuid) -> Result<Option<Measurement>, AppError> {
        let measurement = sqlx::query_as::<_, Measurement>(&format!("SELECT {MEASUREMENT_COLUMNS} FROM measurement WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(measurement)
    }

    pub async fn create_measurement(&self, request: &MeasurementRequest, creator_id: &Uuid) -> Result<Measurement, AppError> {
        let measurement = sqlx::query_as::<_, Measurement>(&format!(
            r#"
            INSERT INTO measurement (patient_id, date, instrument_id, od, os, creator_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEASUREMENT_COLUMNS}
            "#
        ))
        .bind(request.patient_id)
        .bind(request.date)
        .bind(request.instrument_id)
        .bind(request.od)
        .bind(request.os)
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(measurement)
    }

    pub async fn delete_measurement(&self, id: &Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM measurement WHERE id = $1").bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Measurement not found".to_string()));
        }
        Ok(())
    }
}
