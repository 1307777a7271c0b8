pub mod healthcare_professional;
pub mod hospital;
pub mod lookup;
pub mod measurement;
pub mod page_view;
pub mod patient;
pub mod patient_deletion;
pub mod patient_k;
pub mod patient_treatment;
pub mod postgres_repository;
pub mod session;
pub mod user;
pub mod user_patient;
