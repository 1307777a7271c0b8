use crate::models::deserialize_some;
use crate::models::hospital::HospitalSelection;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Membership of a user in a hospital.
#[derive(Serialize, Debug, Clone, sqlx::FromRow, JsonSchema)]
pub struct HealthcareProfessional {
    pub user_id: Uuid,
    pub name: String,
    pub country_id: Uuid,
    pub hospital_id: Uuid,
    pub role: String,
    pub approved: bool,
    pub is_admin: bool,
    pub default_ethnicity_id: Option<Uuid>,
    pub default_instrument_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct HealthcareProfessionalRequest {
    #[validate(length(min = 1))]
    pub name: String,
    pub country_id: Uuid,
    pub hospital: HospitalSelection,
    pub role: String,
    #[serde(default)]
    pub default_ethnicity_id: Option<Uuid>,
    #[serde(default)]
    pub default_instrument_id: Option<Uuid>,
}

impl HealthcareProfessionalRequest {
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.hospital.validate()
    }
}

/// Profile update for the caller's own membership. `null` clears a default.
#[derive(Deserialize, Debug, Default, JsonSchema)]
pub struct HealthcareProfessionalPatchRequest {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub default_ethnicity_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub default_instrument_id: Option<Option<Uuid>>,
}

impl HealthcareProfessionalPatchRequest {
    pub fn apply(&self, current: &HealthcareProfessional) -> ProfileUpdate {
        ProfileUpdate {
            role: self.role.clone().unwrap_or_else(|| current.role.clone()),
            default_ethnicity_id: self.default_ethnicity_id.unwrap_or(current.default_ethnicity_id),
            default_instrument_id: self.default_instrument_id.unwrap_or(current.default_instrument_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub role: String,
    pub default_ethnicity_id: Option<Uuid>,
    pub default_instrument_id: Option<Uuid>,
}

/// Flags a site or hospital admin may toggle on a membership.
#[derive(Deserialize, Debug, Default, Clone, Copy, JsonSchema)]
pub struct MembershipPatchRequest {
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

impl MembershipPatchRequest {
    pub fn is_empty(&self) -> bool {
        self.approved.is_none() && self.is_admin.is_none()
    }
}
