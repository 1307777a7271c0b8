pub mod health;
pub mod healthcare_professional;
pub mod hospital;
pub mod lookup;
pub mod measurement;
pub mod news;
pub mod page_view;
pub mod patient;
pub mod patient_k;
pub mod patient_treatment;
pub mod sensitive;
pub mod session;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`)
/// on PATCH payloads. Use together with `#[serde(default)]`.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
