//! Email verification tokens.
//!
//! Each user holds at most one live token. A token moves the account from
//! unverified to verified exactly once; expired tokens are cleared the first
//! time someone presents them, so they never validate again.

use crate::models::activity::ActivityType;
use crate::models::user::{User, UserUpdate};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::audit_service::AuditService;
use crate::services::email_service::EmailService;
use crate::services::user_service::{CreateUserRequest, UserService, UserServiceError};
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_RESEND_INTERVAL_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Invalid verification token")]
    InvalidToken,
    #[error("Verification token has expired")]
    ExpiredToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("Verification email was sent recently; retry in {retry_after_secs}s")]
    ResendTooSoon { retry_after_secs: i64 },
    #[error(transparent)]
    User(#[from] UserServiceError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub base_url: String,
    pub token_ttl: Duration,
    /// Minimum time between two issued tokens for the same user.
    pub resend_interval: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            resend_interval: Duration::seconds(DEFAULT_RESEND_INTERVAL_SECS),
        }
    }
}

pub struct VerificationService {
    user_repository: Arc<dyn UserRepository>,
    user_service: Arc<UserService>,
    audit: Arc<AuditService>,
    email_service: Arc<dyn EmailService>,
    config: VerificationConfig,
}

impl VerificationService {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        user_service: Arc<UserService>,
        audit: Arc<AuditService>,
        email_service: Arc<dyn EmailService>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            user_repository,
            user_service,
            audit,
            email_service,
            config,
        }
    }

    fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        hex::encode(bytes)
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/auth/verify/{}",
            self.config.base_url.trim_end_matches('/'),
            token
        )
    }

    /// Creates the account, records `user_created`, issues a token and mails
    /// the link. A delivery failure is logged; the user can ask for a resend.
    pub async fn register(&self, request: CreateUserRequest) -> Result<User, VerificationError> {
        let user = self.user_service.create_user(request).await?;

        self.audit
            .record(
                ActivityType::UserCreated,
                &user.id,
                format!("Account registered for {}", user.email),
                None,
            )
            .await;

        let token = self.issue_token(&user.id).await?;
        self.deliver(&user, &token).await;

        let user = self
            .user_repository
            .find_by_id(&user.id)
            .await?
            .unwrap_or(user);

        Ok(user)
    }

    /// Issues a fresh token, replacing any outstanding one.
    pub async fn issue_token(&self, user_id: &str) -> Result<String, VerificationError> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(VerificationError::UserNotFound)?;

        if user.verified {
            return Err(VerificationError::AlreadyVerified);
        }

        let token = Self::generate_token();
        let expires_at = Utc::now() + self.config.token_ttl;

        self.user_repository
            .update_user(user_id, UserUpdate::set_token(token.clone(), expires_at))
            .await?
            .ok_or(VerificationError::UserNotFound)?;

        tracing::debug!(user_id = %user_id, expires_at = %expires_at, "verification token issued");
        Ok(token)
    }

    /// Consumes `token` and marks its owner verified. Returns the user id.
    ///
    /// Expiry and presence are checked by the same conditional write, so of
    /// two concurrent calls with the same token only one succeeds, and a
    /// token never verifies after its expiry.
    pub async fn consume_token(&self, token: &str) -> Result<String, VerificationError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VerificationError::InvalidToken);
        }

        if let Some(user_id) = self.user_repository.consume_token(token, Utc::now()).await? {
            self.audit
                .record(ActivityType::UserVerified, &user_id, "Email verified", None)
                .await;
            return Ok(user_id);
        }

        // still held means it was presented after its expiry
        match self.user_repository.find_by_token(token).await? {
            Some(user) => {
                self.user_repository.clear_token(token).await?;
                tracing::info!(user_id = %user.id, "expired verification token presented; cleared");
                Err(VerificationError::ExpiredToken)
            }
            None => Err(VerificationError::InvalidToken),
        }
    }

    /// Re-issues a token, at most once per `resend_interval`.
    pub async fn resend_token(&self, user_id: &str) -> Result<String, VerificationError> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(VerificationError::UserNotFound)?;

        if user.verified {
            return Err(VerificationError::AlreadyVerified);
        }

        if let Some(expires_at) = user.verification_token_expires_at {
            let issued_at = expires_at - self.config.token_ttl;
            let elapsed = Utc::now() - issued_at;
            if elapsed < self.config.resend_interval {
                let retry_after_secs = (self.config.resend_interval - elapsed).num_seconds().max(1);
                return Err(VerificationError::ResendTooSoon { retry_after_secs });
            }
        }

        self.issue_token(user_id).await
    }

    /// Resend flow for the public endpoint: looks the account up by email
    /// and mails the new link.
    pub async fn resend_for_email(&self, email: &str) -> Result<(), VerificationError> {
        let user = self
            .user_service
            .find_user_by_email(email)
            .await?
            .ok_or(VerificationError::UserNotFound)?;

        let token = self.resend_token(&user.id).await?;
        self.deliver(&user, &token).await;
        Ok(())
    }

    async fn deliver(&self, user: &User, token: &str) -> bool {
        let link = self.verification_link(token);
        match self
            .email_service
            .send_verification_email(&user.email, user.display_name(), &link)
            .await
        {
            Ok(()) => {
                tracing::info!("✅ Verification email sent to: {}", user.email);
                true
            }
            Err(e) => {
                tracing::error!("❌ Failed to send verification email to {}: {:?}", user.email, e);
                false
            }
        }
    }
}
