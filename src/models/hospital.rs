use crate::models::lookup::Country;
use chrono::{DateTime, Utc};
use regex::Regex;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::sync::LazyLock;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

static HOSPITAL_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]{1,10}$").expect("valid hospital code pattern"));

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    pub country_id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct HospitalWithCountryRow {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub country_id: Uuid,
    pub country_name: String,
    pub country_code: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct HospitalResponse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub country_id: Uuid,
}

impl From<&Hospital> for HospitalResponse {
    fn from(hospital: &Hospital) -> Self {
        Self {
            id: hospital.id,
            name: hospital.name.clone(),
            code: hospital.code.clone(),
            country_id: hospital.country_id,
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct HospitalWithCountryResponse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub country_id: Uuid,
    pub country: Country,
}

impl From<HospitalWithCountryRow> for HospitalWithCountryResponse {
    fn from(row: HospitalWithCountryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            country_id: row.country_id,
            country: Country {
                id: row.country_id,
                name: row.country_name,
                code: row.country_code,
            },
        }
    }
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct NewHospitalRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub country_id: Uuid,
    #[validate(regex(path = *HOSPITAL_CODE))]
    #[schemars(regex(pattern = r"^[a-zA-Z0-9]{1,10}$"))]
    pub code: String,
}

#[derive(Deserialize, Debug, Clone, JsonSchema)]
pub struct ExistingHospitalRequest {
    pub id: Uuid,
}

/// Either a reference to a hospital that already exists or the data for a new
/// one. A payload carrying an `id` always selects the existing hospital.
#[derive(Deserialize, Debug, Clone, JsonSchema)]
#[serde(untagged)]
pub enum HospitalSelection {
    Existing(ExistingHospitalRequest),
    New(NewHospitalRequest),
}

impl HospitalSelection {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            HospitalSelection::Existing(_) => Ok(()),
            HospitalSelection::New(hospital) => hospital.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selection_with_id_is_existing() {
        let selection: HospitalSelection = serde_json::from_value(json!({"id": Uuid::nil()})).unwrap();
        assert!(matches!(selection, HospitalSelection::Existing(_)));
    }

    #[test]
    fn selection_without_id_is_new() {
        let selection: HospitalSelection = serde_json::from_value(json!({
            "name": "Seoul Eye Center",
            "country_id": Uuid::nil(),
            "code": "SEC01"
        }))
        .unwrap();
        assert!(matches!(selection, HospitalSelection::New(_)));
        assert!(selection.validate().is_ok());
    }

    #[test]
    fn hospital_code_must_be_short_alphanumeric() {
        for code in ["", "ABC-1", "ABCDEFGHIJK", "코드"] {
            let selection = HospitalSelection::New(NewHospitalRequest {
                name: "Clinic".to_string(),
                country_id: Uuid::nil(),
                code: code.to_string(),
            });
            assert!(selection.validate().is_err(), "code {code:?} should be rejected");
        }
    }

    #[test]
    fn incomplete_selection_is_rejected() {
        let result = serde_json::from_value::<HospitalSelection>(json!({"name": "Clinic"}));
        assert!(result.is_err());
    }
}
