// src/db/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Profile row backing authorization decisions. `role` is a comma-joined tag
/// set (e.g. "requester,reviewer"); the engine parses it into a `RoleSet`
/// rather than re-splitting the string at call sites.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub department: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub department: Option<String>,
}
