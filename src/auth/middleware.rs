use crate::auth::session::session_user_id;
use crate::error::AppError;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

/// Rejects requests that carry no logged-in session with 401. Role checks
/// happen later, in the guard.
pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    if session_user_id(&session).await.is_some() {
        next.run(request).await
    } else {
        AppError::Unauthorized.into_response()
    }
}
