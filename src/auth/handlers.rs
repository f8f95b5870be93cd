use crate::auth::session::{session_user_id, start_session};
use crate::error::{AppError, Result};
use crate::models::user::{PublicUser, Role};
use crate::services::{
    auth_service::LoginRequest, user_service::CreateUserRequest,
    verification_service::VerificationError,
};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

const RESEND_ACCEPTED: &str =
    "If an unverified account exists for this address, a new verification email has been sent";

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    token: String,
}

#[derive(Deserialize)]
pub struct ResendRequest {
    email: String,
}

pub async fn register_handler(
    State(app_state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(form) = payload?;

    let request = CreateUserRequest {
        email: form.email,
        name: form.name.filter(|name| !name.trim().is_empty()),
        password: form.password,
        role: Role::Student,
    };

    let user = app_state.verification_service.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created. Check your email to verify your address.",
            "user": PublicUser::from(user),
        })),
    ))
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    session: Session,
    payload: std::result::Result<Json<LoginForm>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(form) = payload?;

    let request = LoginRequest {
        email: form.email,
        password: form.password,
    };

    let user = app_state.auth_service.authenticate(request).await?;
    start_session(&session, &user).await?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(json!({
        "success": true,
        "user": PublicUser::from(user),
    })))
}

pub async fn logout_handler(session: Session) -> Result<Json<Value>> {
    session.flush().await?;
    Ok(Json(json!({ "success": true, "message": "Logged out" })))
}

pub async fn me_handler(State(app_state): State<AppState>, session: Session) -> Result<Json<Value>> {
    let user_id = session_user_id(&session)
        .await
        .ok_or(AppError::Unauthorized)?;

    let user = app_state
        .user_service
        .find_user_by_id(&user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(json!({
        "success": true,
        "user": PublicUser::from(user),
    })))
}

async fn verify(app_state: &AppState, token: &str) -> Result<Json<Value>> {
    let user_id = app_state.verification_service.consume_token(token).await?;
    tracing::info!(user_id = %user_id, "email verified");

    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully",
    })))
}

pub async fn verify_token_handler(
    State(app_state): State<AppState>,
    payload: std::result::Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = payload?;
    verify(&app_state, &body.token).await
}

/// Link target for the verification email.
pub async fn verify_link_handler(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>> {
    verify(&app_state, &token).await
}

pub async fn resend_verification_handler(
    State(app_state): State<AppState>,
    payload: std::result::Result<Json<ResendRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = payload?;

    match app_state
        .verification_service
        .resend_for_email(&body.email)
        .await
    {
        // same answer whether or not the address is known
        Ok(()) | Err(VerificationError::UserNotFound) | Err(VerificationError::AlreadyVerified) => {
            Ok(Json(json!({ "success": true, "message": RESEND_ACCEPTED })))
        }
        Err(err) => Err(err.into()),
    }
}
