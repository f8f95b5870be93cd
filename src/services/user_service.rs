use crate::models::user::{NewUser, Role, User, UserFilter, UserUpdate, UserUpdateError};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("{0}")]
    Validation(#[from] UserUpdateError),
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct CreateUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub password: String,
    pub role: Role,
}

impl CreateUserRequest {
    /// Self-service registration shape: role is always the default.
    pub fn student(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            password: password.into(),
            role: Role::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
}

/// Lowercased, trimmed form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let email = normalize_email(&request.email);
        self.validate_email(&email)?;
        self.validate_password(&request.password)?;

        let password_hash = self.hash_password(&request.password)?;
        let name = request
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let new_user = NewUser {
            email,
            name,
            password_hash,
            role: request.role,
        };

        match self.repository.create_user(new_user).await {
            Ok(user) => {
                tracing::debug!(user_id = %user.id, role = %user.role, "user record created");
                Ok(user)
            }
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(&normalize_email(email)).await?)
    }

    /// Applies a restricted field update. `Ok(None)` means no such user.
    pub async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<User>, UserServiceError> {
        if update.is_empty() {
            return Ok(self.repository.find_by_id(id).await?);
        }

        if update.verified == Some(true)
            && matches!(update.verification_token, Some(Some(_)))
        {
            return Err(UserUpdateError::InvalidValue {
                field: "verificationToken".to_string(),
                reason: "a verified user cannot hold a verification token".to_string(),
            }
            .into());
        }

        Ok(self.repository.update_user(id, update).await?)
    }

    /// Same as [`update_user`](Self::update_user) for an untyped partial
    /// document; `id` and `email` keys are rejected before anything is written.
    pub async fn update_user_fields(
        &self,
        id: &str,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<User>, UserServiceError> {
        let update = UserUpdate::from_json(fields)?;
        self.update_user(id, update).await
    }

    /// Returns `false` when there was nothing to delete. Audit entries that
    /// reference the user are left untouched.
    pub async fn delete_user(&self, id: &str) -> Result<bool, UserServiceError> {
        Ok(self.repository.delete_user(id).await?)
    }

    pub async fn list_users(
        &self,
        filter: UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<UserPage, UserServiceError> {
        let users = self.repository.list_users(filter, limit, offset).await?;
        let total = self.repository.count_users(filter).await?;
        Ok(UserPage { users, total })
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if email.is_empty() || email.len() > 255 || !EMAIL_PATTERN.is_match(email) {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), UserServiceError> {
        if password.len() < 8 {
            return Err(UserServiceError::WeakPassword);
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserServiceError::HashingError(e.to_string()))
    }
}
