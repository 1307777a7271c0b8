use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::lookup::{Country, Ethnicity, GrowthData, Instrument, Treatment};
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use sqlx::PgPool;

#[openapi(tag = "Static")]
#[get("/country")]
pub async fn list_countries(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<Country>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(repo.list_countries().await?))
}

#[openapi(tag = "Static")]
#[get("/instrument")]
pub async fn list_instruments(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<Instrument>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(repo.list_instruments().await?))
}

#[openapi(tag = "Static")]
#[get("/ethnicity")]
pub async fn list_ethnicities(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<Ethnicity>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(repo.list_ethnicities().await?))
}

#[openapi(tag = "Static")]
#[get("/treatment")]
pub async fn list_treatments(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<Treatment>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(repo.list_treatments().await?))
}

/// Axial-length growth percentiles used to plot patient curves
#[openapi(tag = "Static")]
#[get("/")]
pub async fn list_growth_data(pool: &State<PgPool>, _rate_limit: RateLimit) -> Result<Json<Vec<GrowthData>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(repo.list_growth_data().await?))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_countries, list_instruments, list_ethnicities, list_treatments]
}

/// Mounted separately at `/growth_data`.
pub fn growth_data_routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![list_growth_data]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_country, test_client, test_config, test_repository};
    use rocket::http::Status;
    use serde_json::Value;

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn lookup_tables_are_public() {
        let repo = test_repository().await;
        let country_id = create_country(&repo).await;
        let client = test_client(test_config()).await;

        let response = client.get("/api/static/country").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let countries: Value = response.into_json().await.unwrap();
        assert!(countries.as_array().unwrap().iter().any(|c| c["id"] == country_id.to_string()));

        for path in ["/api/static/instrument", "/api/static/ethnicity", "/api/static/treatment", "/api/growth_data"] {
            let response = client.get(path).dispatch().await;
            assert_eq!(response.status(), Status::Ok, "{path}");
        }
    }
}
