use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::lookup::{Country, Ethnicity, GrowthData, Instrument, Treatment};
use uuid::Uuid;

impl PostgresRepository {
    pub async fn list_countries(&self) -> Result<Vec<Country>, AppError> {
        let countries = sqlx::query_as::<_, Country>("SELECT id, name, code FROM country ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(countries)
    }

    pub async fn list_instruments(&self) -> Result<Vec<Instrument>, AppError> {
        let instruments = sqlx::query_as::<_, Instrument>("SELECT id, name FROM instrument ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(instruments)
    }

    pub async fn list_ethnicities(&self) -> Result<Vec<Ethnicity>, AppError> {
        let ethnicities = sqlx::query_as::<_, Ethnicity>("SELECT id, name FROM ethnicity ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(ethnicities)
    }

    pub async fn get_ethnicity(&self, id: &Uuid) -> Result<Option<Ethnicity>, AppError> {
        let ethnicity = sqlx::query_as::<_, Ethnicity>("SELECT id, name FROM ethnicity WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ethnicity)
    }

    pub async fn list_treatments(&self) -> Result<Vec<Treatment>, AppError> {
        let treatments = sqlx::query_as::<_, Treatment>("SELECT id, name FROM treatment ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(treatments)
    }

    pub async fn list_growth_data(&self) -> Result<Vec<GrowthData>, AppError> {
        let rows = sqlx::query_as::<_, GrowthData>(
            "SELECT id, ethnicity_id, sex, age, percentile, axial_length FROM growth_data ORDER BY ethnicity_id, sex, percentile, age",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
