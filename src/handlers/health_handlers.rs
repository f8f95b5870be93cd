use crate::error::{AppError, Result};
use crate::AppState;
use axum::{extract::State, response::Json};
use serde_json::{json, Value};

pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    sqlx::query("SELECT 1")
        .execute(&state.pool)
        .await
        .map_err(|e| AppError::InternalError(format!("database unavailable: {e}")))?;

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
