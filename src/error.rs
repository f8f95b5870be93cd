use crate::auth::guard::AuthzError;
use crate::models::user::UserUpdateError;
use crate::repositories::user_repository::RepositoryError;
use crate::services::auth_service::AuthServiceError;
use crate::services::user_service::UserServiceError;
use crate::services::verification_service::VerificationError;
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Client-facing error taxonomy. Every service error converts into one of
/// these; only the persistence and internal variants hide their detail.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid or already used verification token")]
    InvalidToken,

    #[error("Verification token has expired; request a new one")]
    ExpiredToken,

    #[error("Too many requests; retry in {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: i64 },

    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidOperation(_)
            | AppError::Validation(_)
            | AppError::InvalidToken
            | AppError::ExpiredToken => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Persistence(_) | AppError::Session(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        // `message` mirrors the success bodies; `error` is kept for clients
        // that key on it
        let body = json!({
            "success": false,
            "error": message,
            "message": message,
        });

        let mut response = (status, Json(body)).into_response();

        if let AppError::TooManyRequests { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthorized => AppError::Unauthorized,
            AuthzError::InvalidOperation(msg) => AppError::InvalidOperation(msg),
        }
    }
}

impl From<UserUpdateError> for AppError {
    fn from(err: UserUpdateError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InvalidEmail | UserServiceError::WeakPassword => {
                AppError::Validation(err.to_string())
            }
            UserServiceError::Validation(e) => e.into(),
            UserServiceError::UserNotFound => AppError::NotFound("User not found".to_string()),
            UserServiceError::EmailTaken => AppError::Conflict(err.to_string()),
            UserServiceError::HashingError(msg) => AppError::InternalError(msg),
            UserServiceError::RepositoryError(e) => AppError::Persistence(e),
        }
    }
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidToken => AppError::InvalidToken,
            VerificationError::ExpiredToken => AppError::ExpiredToken,
            VerificationError::UserNotFound => AppError::NotFound("User not found".to_string()),
            VerificationError::AlreadyVerified => AppError::InvalidOperation(err.to_string()),
            VerificationError::ResendTooSoon { retry_after_secs } => {
                AppError::TooManyRequests { retry_after_secs }
            }
            VerificationError::User(e) => e.into(),
            VerificationError::Repository(e) => AppError::Persistence(e),
        }
    }
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials => {
                AppError::AuthenticationFailed("Invalid email or password".to_string())
            }
            AuthServiceError::EmailNotVerified => AppError::AuthenticationFailed(
                "Please verify your email before logging in".to_string(),
            ),
            AuthServiceError::RepositoryError(e) => AppError::Persistence(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::InvalidOperation("self".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::ExpiredToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::TooManyRequests { retry_after_secs: 5 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::Persistence(RepositoryError::Database(sqlx::Error::PoolTimedOut)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_persistence_error_hides_detail() {
        let response =
            AppError::Persistence(RepositoryError::Database(sqlx::Error::Protocol(
                "disk I/O error at /var/db/users".to_string(),
            )))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("Internal server error"));
        assert!(!body.contains("/var/db"));
    }

    #[test]
    fn test_retry_after_header() {
        let response = AppError::TooManyRequests { retry_after_secs: 42 }.into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );
    }

    #[test]
    fn test_guard_errors_map() {
        assert!(matches!(
            AppError::from(AuthzError::Unauthorized),
            AppError::Unauthorized
        ));
        assert!(matches!(
            AppError::from(AuthzError::InvalidOperation("no".into())),
            AppError::InvalidOperation(_)
        ));
    }
}
