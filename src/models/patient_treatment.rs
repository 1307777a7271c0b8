use crate::models::deserialize_some;
use chrono::NaiveDate;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatientTreatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub treatment_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct PatientTreatmentResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub treatment_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<&PatientTreatment> for PatientTreatmentResponse {
    fn from(treatment: &PatientTreatment) -> Self {
        Self {
            id: treatment.id,
            patient_id: treatment.patient_id,
            treatment_id: treatment.treatment_id,
            start_date: treatment.start_date,
            end_date: treatment.end_date,
        }
    }
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct PatientTreatmentRequest {
    pub patient_id: Uuid,
    pub treatment_id: Uuid,
    pub start_date: NaiveDate,
    /// `null` or absent for an ongoing treatment.
    pub end_date: Option<NaiveDate>,
}

/// Partial update. An explicit `null` end date reopens the treatment.
#[derive(Deserialize, Debug, Default, JsonSchema)]
pub struct PatientTreatmentPatchRequest {
    #[serde(default)]
    pub treatment_id: Option<Uuid>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub end_date: Option<Option<NaiveDate>>,
}

impl PatientTreatmentPatchRequest {
    /// Applies the patch on top of the stored row.
    pub fn apply(&self, current: &PatientTreatment) -> PatientTreatment {
        PatientTreatment {
            id: current.id,
            patient_id: current.patient_id,
            treatment_id: self.treatment_id.unwrap_or(current.treatment_id),
            start_date: self.start_date.unwrap_or(current.start_date),
            end_date: match self.end_date {
                Some(end_date) => end_date,
                None => current.end_date,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored() -> PatientTreatment {
        PatientTreatment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            treatment_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, 6, 1),
        }
    }

    #[test]
    fn absent_end_date_keeps_stored_value() {
        let current = stored();
        let patch: PatientTreatmentPatchRequest = serde_json::from_value(json!({"start_date": "2023-02-01"})).unwrap();
        let updated = patch.apply(&current);
        assert_eq!(updated.end_date, current.end_date);
        assert_eq!(updated.start_date, NaiveDate::from_ymd_opt(2023, 2, 1).unwrap());
    }

    #[test]
    fn explicit_null_clears_end_date() {
        let patch: PatientTreatmentPatchRequest = serde_json::from_value(json!({"end_date": null})).unwrap();
        assert_eq!(patch.apply(&stored()).end_date, None);
    }

    #[test]
    fn create_request_treats_missing_end_date_as_ongoing() {
        let result = serde_json::from_value::<PatientTreatmentRequest>(json!({
            "patient_id": Uuid::nil(),
            "treatment_id": Uuid::nil(),
            "start_date": "2023-01-01"
        }));
        assert_eq!(result.unwrap().end_date, None);
    }
}
