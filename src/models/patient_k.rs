use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::str::FromStr;
use uuid::Uuid;

/// Keratometry reading slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum KType {
    K1,
    K2,
}

impl KType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KType::K1 => "k1",
            KType::K2 => "k2",
        }
    }
}

impl FromStr for KType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "k1" => Ok(KType::K1),
            "k2" => Ok(KType::K2),
            other => Err(format!("Unknown k_type value: {other}")),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatientKRow {
    pub patient_id: Uuid,
    pub k_type: String,
    pub od: Option<f64>,
    pub os: Option<f64>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct PatientKResponse {
    pub patient_id: Uuid,
    pub k_type: KType,
    pub od: Option<f64>,
    pub os: Option<f64>,
}

impl TryFrom<PatientKRow> for PatientKResponse {
    type Error = String;

    fn try_from(row: PatientKRow) -> Result<Self, Self::Error> {
        Ok(Self {
            patient_id: row.patient_id,
            k_type: row.k_type.parse()?,
            od: row.od,
            os: row.os,
        })
    }
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct PatientKRequest {
    pub patient_id: Uuid,
    pub k_type: KType,
    pub od: Option<f64>,
    pub os: Option<f64>,
}
