use crate::auth::guard::Actor;
use crate::auth::session::resolve_actor;
use crate::error::Result;
use crate::services::admin_service::ListUsersParams;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    role: Option<String>,
    verified: Option<String>,
    limit: Option<String>,
    skip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListActivitiesQuery {
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    role: Option<String>,
}

async fn current_actor(state: &AppState, session: &Session) -> Result<Option<Actor>> {
    Ok(resolve_actor(session, state.user_repository.as_ref()).await?)
}

pub async fn list_users_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Value>> {
    let actor = current_actor(&state, &session).await?;

    let params = ListUsersParams {
        role: query.role,
        verified: query.verified,
        limit: query.limit,
        skip: query.skip,
    };

    let listing = state.admin_service.list_users(actor.as_ref(), &params).await?;
    Ok(Json(json!(listing)))
}

pub async fn change_role_handler(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<String>,
    payload: std::result::Result<Json<ChangeRoleRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let actor = current_actor(&state, &session).await?;

    // a broken body is reported by the service after the guard has run
    let role = payload.ok().and_then(|Json(body)| body.role);

    let user = state
        .admin_service
        .change_role(actor.as_ref(), &user_id, role.as_deref())
        .await?;

    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn verify_user_handler(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let actor = current_actor(&state, &session).await?;
    let user = state.admin_service.force_verify(actor.as_ref(), &user_id).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let actor = current_actor(&state, &session).await?;
    let user = state.admin_service.delete_user(actor.as_ref(), &user_id).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn list_activities_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListActivitiesQuery>,
) -> Result<Json<Value>> {
    let actor = current_actor(&state, &session).await?;

    let (activities, limit) = state
        .admin_service
        .list_activities(actor.as_ref(), query.limit.as_deref())
        .await?;

    Ok(Json(json!({ "activities": activities, "limit": limit })))
}
