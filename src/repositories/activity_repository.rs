use crate::models::activity::{Activity, NewActivity};
use crate::repositories::user_repository::RepositoryResult;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

const ACTIVITY_COLUMNS: &str = "id, type, user_id, performed_by, details, timestamp";

/// Append-only access to the audit trail. There is deliberately no update or
/// delete method; the schema rejects both as well.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ActivityRepository: Send + Sync {
    async fn insert(&self, activity: NewActivity) -> RepositoryResult<Activity>;
    /// Newest first.
    async fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<Activity>>;
    /// Newest first. Works for users that have since been deleted.
    async fn list_for_user(&self, user_id: &str) -> RepositoryResult<Vec<Activity>>;
}

pub struct SqliteActivityRepository {
    pool: SqlitePool,
}

impl SqliteActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for SqliteActivityRepository {
    async fn insert(&self, activity: NewActivity) -> RepositoryResult<Activity> {
        let record = Activity {
            id: Uuid::new_v4().to_string(),
            kind: activity.kind,
            user_id: activity.user_id,
            performed_by: activity.performed_by,
            details: activity.details,
            timestamp: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO activities (id, type, user_id, performed_by, details, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.kind)
        .bind(&record.user_id)
        .bind(&record.performed_by)
        .bind(&record.details)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_recent(&self, limit: i64) -> RepositoryResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY timestamp DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }

    async fn list_for_user(&self, user_id: &str) -> RepositoryResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE user_id = ? \
             ORDER BY timestamp DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }
}
