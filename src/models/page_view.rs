use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;

#[derive(Deserialize, Debug, Default, JsonSchema)]
pub struct TrackRequest {
    #[serde(default)]
    pub path: Option<String>,
}

impl TrackRequest {
    pub fn path_or_root(&self) -> &str {
        match self.path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => "/",
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats {
    pub daily_visits: i64,
    pub total_visits: i64,
}
