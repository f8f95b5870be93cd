use crate::models::activity::{Activity, ActivityType, NewActivity};
use crate::repositories::activity_repository::ActivityRepository;
use crate::repositories::user_repository::RepositoryError;
use std::sync::Arc;

/// Appends audit trail entries.
///
/// Recording is best effort: the primary mutation has already been committed
/// when `record` runs, and a failed insert is reported through `tracing` only.
pub struct AuditService {
    repository: Arc<dyn ActivityRepository>,
}

impl AuditService {
    pub fn new(repository: Arc<dyn ActivityRepository>) -> Self {
        Self { repository }
    }

    pub async fn record(
        &self,
        kind: ActivityType,
        user_id: &str,
        details: impl Into<String>,
        performed_by: Option<&str>,
    ) {
        let activity = NewActivity {
            kind,
            user_id: user_id.to_string(),
            performed_by: performed_by.map(str::to_string),
            details: details.into(),
        };

        match self.repository.insert(activity).await {
            Ok(entry) => {
                tracing::info!(
                    activity_id = %entry.id,
                    kind = %entry.kind,
                    user_id = %entry.user_id,
                    performed_by = entry.performed_by.as_deref().unwrap_or("self"),
                    "audit entry recorded"
                );
            }
            Err(e) => {
                tracing::error!(
                    kind = %kind,
                    user_id = %user_id,
                    error = %e,
                    "failed to record audit entry"
                );
            }
        }
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Activity>, RepositoryError> {
        self.repository.list_recent(limit).await
    }

    pub async fn for_user(&self, user_id: &str) -> Result<Vec<Activity>, RepositoryError> {
        self.repository.list_for_user(user_id).await
    }
}
