use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::hospital::{Hospital, HospitalWithCountryRow, NewHospitalRequest};
use sqlx::PgConnection;
use uuid::Uuid;

/// Inserts a hospital on an open connection so callers can pair it with
/// other writes in one transaction.
pub(crate) async fn insert_hospital(conn: &mut PgConnection, request: &NewHospitalRequest) -> Result<Hospital, AppError> {
    let hospital = sqlx::query_as::<_, Hospital>(
        r#"
        INSERT INTO hospital (name, country_id, code)
        VALUES ($1, $2, $3)
        RETURNING id, name, country_id, code, created_at
        "#,
    )
    .bind(&request.name)
    .bind(request.country_id)
    .bind(&request.code)
    .fetch_one(conn)
    .await?;

    Ok(hospital)
}

impl PostgresRepository {
    pub async fn list_hospitals(&self) -> Result<Vec<HospitalWithCountryRow>, AppError> {
        let rows = sqlx::query_as::<_, HospitalWithCountryRow>(
            r#"
            SELECT h.id, h.name, h.code, h.country_id,
                   c.name AS country_name, c.code AS country_code
            FROM hospital h
            JOIN country c ON c.id = h.country_id
            ORDER BY h.name, h.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_hospital(&self, id: &Uuid) -> Result<Option<Hospital>, AppError> {
        let hospital = sqlx::query_as::<_, Hospital>(
            r#"
            SELECT id, name, country_id, code, created_at
            FROM hospital
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hospital)
    }
}
