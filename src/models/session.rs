use chrono::{DateTime, Utc};
use rocket::serde::Serialize;
use schemars::JsonSchema;
use uuid::Uuid;

/// A persisted bearer session. The `session_key` is what clients send in
/// `Authorization: Bearer <key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow, JsonSchema)]
pub struct Session {
    pub id: Uuid,
    pub session_key: String,
    pub user_id: Uuid,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
