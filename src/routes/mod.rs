pub mod auth;
pub mod error;
pub mod health;
pub mod healthcare_professional;
pub mod hospital;
pub mod lookup;
pub mod measurement;
pub mod news;
pub mod patient;
pub mod patient_k;
pub mod patient_treatment;
pub mod track;
pub mod user;
