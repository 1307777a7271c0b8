use rocket::serde::Serialize;
use schemars::JsonSchema;
use uuid::Uuid;

#[derive(Serialize, Debug, Clone, sqlx::FromRow, JsonSchema)]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    pub code: String,
}

#[derive(Serialize, Debug, Clone, sqlx::FromRow, JsonSchema)]
pub struct Instrument {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, sqlx::FromRow, JsonSchema)]
pub struct Ethnicity {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, sqlx::FromRow, JsonSchema)]
pub struct Treatment {
    pub id: Uuid,
    pub name: String,
}

/// Reference axial-length percentile for a given age, sex and ethnicity.
#[derive(Serialize, Debug, Clone, sqlx::FromRow, JsonSchema)]
pub struct GrowthData {
    pub id: Uuid,
    pub ethnicity_id: Option<Uuid>,
    pub sex: String,
    pub age: f64,
    pub percentile: i32,
    pub axial_length: f64,
}
