use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Measurement {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub instrument_id: Uuid,
    pub od: f64,
    pub os: f64,
    pub creator_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct MeasurementResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub instrument_id: Uuid,
    pub od: f64,
    pub os: f64,
    pub creator_id: Option<Uuid>,
}

impl From<&Measurement> for MeasurementResponse {
    fn from(measurement: &Measurement) -> Self {
        Self {
            id: measurement.id,
            patient_id: measurement.patient_id,
            date: measurement.date,
            instrument_id: measurement.instrument_id,
            od: measurement.od,
            os: measurement.os,
            creator_id: measurement.creator_id,
        }
    }
}

/// Axial length for both eyes, in millimetres.
#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct MeasurementRequest {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub instrument_id: Uuid,
    #[validate(range(min = 15.0, max = 35.0))]
    pub od: f64,
    #[validate(range(min = 15.0, max = 35.0))]
    pub os: f64,
}
