use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ActivityType {
    UserCreated,
    UserVerified,
    UserDeleted,
    RoleChanged,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::UserCreated => "user_created",
            ActivityType::UserVerified => "user_verified",
            ActivityType::UserDeleted => "user_deleted",
            ActivityType::RoleChanged => "role_changed",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One audit trail entry. `user_id` may reference a user that no longer exists.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub user_id: String,
    /// `None` for self-service actions such as clicking a verification link.
    pub performed_by: Option<String>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub kind: ActivityType,
    pub user_id: String,
    pub performed_by: Option<String>,
    pub details: String,
}
