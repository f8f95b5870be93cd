pub mod test_helpers {
    use crate::models::user::Role;
    use crate::services::email_service::{EmailError, EmailService};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::{Arc, Mutex};

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        // a single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Insert a user row directly, bypassing validation and auditing.
    /// Returns the generated id.
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        password: &str,
        role: Role,
        verified: bool,
    ) -> Result<String, sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, role, verified, created_at, updated_at)
            VALUES (?, ?, NULL, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(verified)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(id)
    }

    /// Overwrites the expiry of a user's outstanding token, e.g. to move it
    /// into the past. Does nothing when the user holds no token.
    pub async fn set_token_expiry(
        pool: &SqlitePool,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET verification_token_expires_at = ? \
             WHERE id = ? AND verification_token IS NOT NULL",
        )
        .bind(expires_at)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn count_activities(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM activities")
            .fetch_one(pool)
            .await
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentEmail {
        pub to: String,
        pub link: String,
    }

    /// Keeps every verification email in memory so tests can follow the link.
    #[derive(Default, Clone)]
    pub struct RecordingEmailService {
        sent: Arc<Mutex<Vec<SentEmail>>>,
    }

    impl RecordingEmailService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }

        /// Token from the most recent link sent to `to`.
        pub fn last_token_for(&self, to: &str) -> Option<String> {
            self.sent()
                .into_iter()
                .rev()
                .find(|email| email.to == to)
                .and_then(|email| email.link.rsplit('/').next().map(str::to_string))
        }
    }

    #[async_trait]
    impl EmailService for RecordingEmailService {
        async fn send_verification_email(
            &self,
            to_email: &str,
            _recipient_name: &str,
            verification_link: &str,
        ) -> Result<(), EmailError> {
            let mut sent = self
                .sent
                .lock()
                .map_err(|e| EmailError::SendFailed(e.to_string()))?;
            sent.push(SentEmail {
                to: to_email.to_string(),
                link: verification_link.to_string(),
            });
            Ok(())
        }
    }

    /// Always fails, for exercising best-effort delivery.
    #[derive(Default, Clone, Copy)]
    pub struct FailingEmailService;

    #[async_trait]
    impl EmailService for FailingEmailService {
        async fn send_verification_email(
            &self,
            _to_email: &str,
            _recipient_name: &str,
            _verification_link: &str,
        ) -> Result<(), EmailError> {
            Err(EmailError::SendFailed("connection refused".to_string()))
        }
    }
}

// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
