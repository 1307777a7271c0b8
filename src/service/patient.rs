use crate::auth::ensure_hospital_access;
use crate::database::patient::{DUPLICATE_PATIENT_MESSAGE, NewPatient};
use crate::database::postgres_repository::PostgresRepository;
use crate::encryption::FieldCipher;
use crate::error::app_error::AppError;
use crate::models::hospital::HospitalResponse;
use crate::models::measurement::MeasurementResponse;
use crate::models::patient::{
    OrderDirection, PatientCreateRequest, PatientDetailResponse, PatientLinkRequest, PatientOrderBy, PatientPatchRequest, PatientResponse, PatientRow,
    PendingDeletionResponse, RequesterResponse, Sex, normalize_registration_number, sort_patients,
};
use crate::models::patient_k::PatientKResponse;
use crate::models::patient_treatment::PatientTreatmentResponse;
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

/// Patient reads and writes that cross the field-encryption boundary.
pub struct PatientService<'a> {
    repository: &'a PostgresRepository,
    cipher: &'a FieldCipher,
}

impl<'a> PatientService<'a> {
    pub fn new(repository: &'a PostgresRepository, cipher: &'a FieldCipher) -> Self {
        PatientService { repository, cipher }
    }

    /// Decrypts a stored row. Any decryption or integrity failure aborts the
    /// whole read.
    pub async fn reveal(&self, row: PatientRow) -> Result<PatientResponse, AppError> {
        let registration_number = match row.registration_number_field() {
            Some(field) => Some(field.reveal(self.cipher).await?),
            None => None,
        };
        let date_of_birth = match row.date_of_birth_field() {
            Some(field) => Some(field.reveal(self.cipher).await?),
            None => None,
        };
        let sex = row
            .sex
            .parse::<Sex>()
            .map_err(|e| AppError::integrity(format!("Stored patient {} has invalid sex: {}", row.id, e)))?;

        Ok(PatientResponse {
            id: row.id,
            hospital_id: row.hospital_id,
            creator_id: row.creator_id,
            registration_number,
            date_of_birth,
            sex,
            ethnicity_id: row.ethnicity_id,
            email: row.email,
            created_at: row.created_at,
        })
    }

    async fn reveal_all(&self, rows: Vec<PatientRow>) -> Result<Vec<PatientResponse>, AppError> {
        let mut patients = Vec::with_capacity(rows.len());
        for row in rows {
            patients.push(self.reveal(row).await?);
        }
        Ok(patients)
    }

    pub async fn list_for_hospital(&self, hospital_id: &Uuid, order_by: PatientOrderBy, direction: OrderDirection) -> Result<Vec<PatientResponse>, AppError> {
        let rows = self.repository.list_patients_by_hospital(hospital_id).await?;
        let mut patients = self.reveal_all(rows).await?;
        sort_patients(&mut patients, order_by, direction);
        Ok(patients)
    }

    /// Full patient record for hospital staff or a linked user.
    pub async fn detail(&self, patient_id: &Uuid, user_id: &Uuid) -> Result<PatientDetailResponse, AppError> {
        let row = self
            .repository
            .get_accessible_patient(patient_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

        let hospital = self
            .repository
            .get_hospital(&row.hospital_id)
            .await?
            .ok_or_else(|| AppError::integrity(format!("Patient {} references a missing hospital", row.id)))?;
        let ethnicity = self
            .repository
            .get_ethnicity(&row.ethnicity_id)
            .await?
            .ok_or_else(|| AppError::integrity(format!("Patient {} references a missing ethnicity", row.id)))?;
        let measurement = self.repository.list_measurements(patient_id).await?;
        let patient_treatment = self.repository.list_patient_treatments(patient_id).await?;
        let patient_k = self
            .repository
            .list_patient_k(patient_id)
            .await?
            .into_iter()
            .map(|row| PatientKResponse::try_from(row).map_err(AppError::integrity))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PatientDetailResponse {
            patient: self.reveal(row).await?,
            hospital: HospitalResponse::from(&hospital),
            ethnicity,
            measurement: measurement.iter().map(MeasurementResponse::from).collect(),
            patient_treatment: patient_treatment.iter().map(PatientTreatmentResponse::from).collect(),
            patient_k,
        })
    }

    /// Patients of `hospital_id` whose registration number equals `normalized`
    /// after trimming and lowercasing.
    async fn registration_matches(&self, hospital_id: &Uuid, normalized: &str, digest: &[u8]) -> Result<Vec<PatientResponse>, AppError> {
        let candidates = self.repository.find_patients_by_registration(hospital_id, digest, normalized).await?;
        let mut matches = Vec::new();
        for row in candidates {
            let patient = self.reveal(row).await?;
            if patient.registration_number.as_deref().map(normalize_registration_number).as_deref() == Some(normalized) {
                matches.push(patient);
            }
        }
        Ok(matches)
    }

    /// Registers a patient in the caller's hospital. Identifiers are written
    /// in encrypted form only.
    pub async fn create(&self, request: &PatientCreateRequest, hospital_id: Uuid, creator_id: Uuid) -> Result<PatientResponse, AppError> {
        let normalized = normalize_registration_number(&request.registration_number);
        let digest = self.cipher.registration_digest(&request.registration_number)?;

        if !self.registration_matches(&hospital_id, &normalized, &digest).await?.is_empty() {
            return Err(AppError::Conflict(DUPLICATE_PATIENT_MESSAGE.to_string()));
        }

        let new_patient = NewPatient {
            hospital_id,
            creator_id,
            encrypted_registration_number: self.cipher.encrypt(request.registration_number.trim()).await?,
            encrypted_date_of_birth: self.encrypt_date(request.date_of_birth).await?,
            registration_digest: digest,
            sex: request.sex,
            ethnicity_id: request.ethnicity_id,
            email: request.email.clone(),
        };
        let row = self.repository.create_patient(&new_patient).await?;
        self.reveal(row).await
    }

    pub async fn update(&self, patient_id: &Uuid, patch: &PatientPatchRequest, hospital_id: Uuid) -> Result<PatientResponse, AppError> {
        let current_hospital = self.repository.get_patient_hospital_id(patient_id).await?;
        ensure_hospital_access(current_hospital, hospital_id, "Patient")?;

        let encrypted_date_of_birth = match patch.date_of_birth {
            Some(date) => Some(self.encrypt_date(date).await?),
            None => None,
        };
        let row = self
            .repository
            .update_patient(patient_id, encrypted_date_of_birth.as_deref(), patch.sex)
            .await?;
        self.reveal(row).await
    }

    async fn encrypt_date(&self, date: NaiveDate) -> Result<Vec<u8>, AppError> {
        self.cipher.encrypt(&date.format("%Y-%m-%d").to_string()).await
    }

    /// Links the caller to the patient matching hospital, registration number
    /// and date of birth.
    pub async fn link(&self, user_id: &Uuid, request: &PatientLinkRequest) -> Result<Uuid, AppError> {
        let normalized = normalize_registration_number(&request.registration_number);
        let digest = self.cipher.registration_digest(&request.registration_number)?;

        let patient = self
            .registration_matches(&request.hospital_id, &normalized, &digest)
            .await?
            .into_iter()
            .find(|patient| patient.date_of_birth == Some(request.date_of_birth))
            .ok_or_else(|| AppError::BadRequest("No matching patient".to_string()))?;

        self.repository.link_patient(user_id, &patient.id).await?;
        Ok(patient.id)
    }

    pub async fn linked(&self, user_id: &Uuid) -> Result<Vec<PatientResponse>, AppError> {
        let ids = self.repository.list_linked_patient_ids(user_id).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.repository.get_patients_by_ids(&ids).await?;
        self.reveal_all(rows).await
    }

    pub async fn pending_deletions(&self, hospital_id: &Uuid) -> Result<Vec<PendingDeletionResponse>, AppError> {
        let pending = self.repository.list_pending_deletions(hospital_id).await?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = pending.iter().map(|row| row.patient_id).collect();
        let mut patients: HashMap<Uuid, PatientResponse> = HashMap::new();
        for patient in self.reveal_all(self.repository.get_patients_by_ids(&ids).await?).await? {
            patients.insert(patient.id, patient);
        }

        pending
            .into_iter()
            .map(|row| {
                let patient = patients
                    .remove(&row.patient_id)
                    .ok_or_else(|| AppError::integrity(format!("Pending deletion references missing patient {}", row.patient_id)))?;
                Ok(PendingDeletionResponse {
                    patient_id: row.patient_id,
                    created_at: row.created_at,
                    patient,
                    requested_by: RequesterResponse {
                        user_id: row.requested_by,
                        name: row.requester_name,
                    },
                })
            })
            .collect()
    }
}
