use crate::models::hospital::HospitalResponse;
use crate::models::lookup::Ethnicity;
use crate::models::measurement::MeasurementResponse;
use crate::models::patient_k::PatientKResponse;
use crate::models::patient_treatment::PatientTreatmentResponse;
use crate::models::sensitive::SensitiveField;
use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            other => Err(format!("Unknown sex value: {other}")),
        }
    }
}

/// Lowercase and trim a registration number before hashing or comparing it.
pub fn normalize_registration_number(value: &str) -> String {
    value.trim().to_lowercase()
}

fn validate_registration_number(value: &str) -> Result<(), ValidationError> {
    if normalize_registration_number(value).is_empty() {
        return Err(ValidationError::new("blank_registration_number"));
    }
    Ok(())
}

/// A patient row with its sensitive columns still in storage form.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatientRow {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub creator_id: Option<Uuid>,
    pub registration_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub encrypted_registration_number: Option<Vec<u8>>,
    pub encrypted_date_of_birth: Option<Vec<u8>>,
    pub sex: String,
    pub ethnicity_id: Uuid,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PatientRow {
    pub fn registration_number_field(&self) -> Option<SensitiveField<String>> {
        SensitiveField::from_columns(self.registration_number.clone(), self.encrypted_registration_number.clone())
    }

    pub fn date_of_birth_field(&self) -> Option<SensitiveField<NaiveDate>> {
        SensitiveField::from_columns(self.date_of_birth, self.encrypted_date_of_birth.clone())
    }
}

/// A patient with its sensitive fields decrypted.
#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct PatientResponse {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub creator_id: Option<Uuid>,
    pub registration_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Sex,
    pub ethnicity_id: Uuid,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PatientDetailResponse {
    #[serde(flatten)]
    pub patient: PatientResponse,
    pub hospital: HospitalResponse,
    pub ethnicity: Ethnicity,
    pub measurement: Vec<MeasurementResponse>,
    pub patient_treatment: Vec<PatientTreatmentResponse>,
    pub patient_k: Vec<PatientKResponse>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PatientCreateRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_registration_number"))]
    pub registration_number: String,
    pub date_of_birth: NaiveDate,
    pub sex: Sex,
    pub ethnicity_id: Uuid,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Deserialize, Debug, Default, JsonSchema)]
pub struct PatientPatchRequest {
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub sex: Option<Sex>,
}

impl PatientPatchRequest {
    pub fn is_empty(&self) -> bool {
        self.date_of_birth.is_none() && self.sex.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientOrderBy {
    CreatedAt,
    RegistrationNumber,
    DateOfBirth,
    Sex,
}

impl FromStr for PatientOrderBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(PatientOrderBy::CreatedAt),
            "registration_number" => Ok(PatientOrderBy::RegistrationNumber),
            "date_of_birth" => Ok(PatientOrderBy::DateOfBirth),
            "sex" => Ok(PatientOrderBy::Sex),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    /// Anything other than `asc` sorts descending.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("asc") => OrderDirection::Asc,
            _ => OrderDirection::Desc,
        }
    }
}

fn compare_missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts decrypted patients in memory. Sorting happens after decryption
/// because the ordered columns are ciphertext in storage.
pub fn sort_patients(patients: &mut [PatientResponse], order_by: PatientOrderBy, direction: OrderDirection) {
    patients.sort_by(|a, b| match order_by {
        PatientOrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
        PatientOrderBy::RegistrationNumber => compare_missing_last(&a.registration_number, &b.registration_number),
        PatientOrderBy::DateOfBirth => compare_missing_last(&a.date_of_birth, &b.date_of_birth),
        PatientOrderBy::Sex => a.sex.as_str().cmp(b.sex.as_str()),
    });
    if direction == OrderDirection::Desc {
        patients.reverse();
    }
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct DeletionRequest {
    pub patient_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PendingDeletionRow {
    pub patient_id: Uuid,
    pub requested_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub requester_name: Option<String>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct RequesterResponse {
    pub user_id: Uuid,
    pub name: Option<String>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PendingDeletionResponse {
    pub patient_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub patient: PatientResponse,
    pub requested_by: RequesterResponse,
}

/// Proof of knowledge a user offers to follow a patient record.
#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PatientLinkRequest {
    pub hospital_id: Uuid,
    #[validate(length(min = 1, max = 64), custom(function = "validate_registration_number"))]
    pub registration_number: String,
    pub date_of_birth: NaiveDate,
}
