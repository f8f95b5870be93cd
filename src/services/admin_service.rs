//! Administrative user management.
//!
//! Every action runs the same sequence: guard, payload validation, mutation,
//! audit entry, stripped response. Nothing is written before the guard and
//! validation have passed, so a denied request leaves no trace in either the
//! users or the activities table.

use crate::auth::guard::{authorize, authorize_all, Actor, Requirement};
use crate::error::{AppError, Result};
use crate::models::activity::{Activity, ActivityType};
use crate::models::user::{PublicUser, Role, User, UserFilter, UserUpdate};
use crate::services::audit_service::AuditService;
use crate::services::user_service::UserService;
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Raw listing parameters as they arrive on the query string.
#[derive(Debug, Clone, Default)]
pub struct ListUsersParams {
    pub role: Option<String>,
    pub verified: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserListing {
    pub users: Vec<PublicUser>,
    pub total: i64,
    pub limit: i64,
    pub skip: i64,
}

pub struct AdminService {
    user_service: Arc<UserService>,
    audit: Arc<AuditService>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

// Numbers arrive as raw strings so a malformed value is reported after the
// guard, with the JSON error body instead of the extractor's rejection.
fn parse_number(field: &str, raw: Option<&str>) -> Result<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<i64>().map(Some).map_err(|_| {
            AppError::InvalidOperation(format!("{field} must be an integer, got '{value}'"))
        }),
    }
}

fn parse_role_filter(raw: Option<&str>) -> Result<Option<Role>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse::<Role>()
            .map(Some)
            .map_err(|e| AppError::InvalidOperation(e.to_string())),
    }
}

fn parse_verified_filter(raw: Option<&str>) -> Result<Option<bool>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(other) => Err(AppError::InvalidOperation(format!(
            "Invalid verified filter '{other}': expected true, false or all"
        ))),
    }
}

impl AdminService {
    pub fn new(user_service: Arc<UserService>, audit: Arc<AuditService>) -> Self {
        Self {
            user_service,
            audit,
        }
    }

    async fn load_target(&self, target_id: &str) -> Result<User> {
        self.user_service
            .find_user_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn list_users(
        &self,
        actor: Option<&Actor>,
        params: &ListUsersParams,
    ) -> Result<UserListing> {
        authorize(actor, Requirement::RequireRole(Role::Admin))?;

        let filter = UserFilter {
            role: parse_role_filter(params.role.as_deref())?,
            verified: parse_verified_filter(params.verified.as_deref())?,
        };
        let limit = clamp_limit(parse_number("limit", params.limit.as_deref())?);
        let skip = parse_number("skip", params.skip.as_deref())?.unwrap_or(0);
        if skip < 0 {
            return Err(AppError::InvalidOperation(
                "skip must not be negative".to_string(),
            ));
        }

        let page = self.user_service.list_users(filter, limit, skip).await?;

        Ok(UserListing {
            users: page.users.into_iter().map(PublicUser::from).collect(),
            total: page.total,
            limit,
            skip,
        })
    }

    pub async fn change_role(
        &self,
        actor: Option<&Actor>,
        target_id: &str,
        role: Option<&str>,
    ) -> Result<PublicUser> {
        authorize_all(
            actor,
            &[
                Requirement::RequireRole(Role::Admin),
                Requirement::ForbidSelf(target_id),
            ],
        )?;
        let actor = actor.ok_or(AppError::Unauthorized)?;

        let new_role = role
            .ok_or_else(|| AppError::InvalidOperation("role is required".to_string()))?
            .trim()
            .parse::<Role>()
            .map_err(|e| AppError::InvalidOperation(e.to_string()))?;

        let target = self.load_target(target_id).await?;
        let previous_role = target.role;

        let updated = self
            .user_service
            .update_user(target_id, UserUpdate::role(new_role))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.audit
            .record(
                ActivityType::RoleChanged,
                &updated.id,
                format!(
                    "Role of {} changed from {} to {}",
                    updated.email, previous_role, new_role
                ),
                Some(&actor.id),
            )
            .await;

        Ok(updated.into())
    }

    pub async fn force_verify(&self, actor: Option<&Actor>, target_id: &str) -> Result<PublicUser> {
        authorize(actor, Requirement::RequireRole(Role::Admin))?;
        let actor = actor.ok_or(AppError::Unauthorized)?;

        let target = self.load_target(target_id).await?;
        if target.verified {
            return Err(AppError::InvalidOperation(
                "User is already verified".to_string(),
            ));
        }

        let updated = self
            .user_service
            .update_user(target_id, UserUpdate::mark_verified())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        self.audit
            .record(
                ActivityType::UserVerified,
                &updated.id,
                format!("Email of {} verified by an administrator", updated.email),
                Some(&actor.id),
            )
            .await;

        Ok(updated.into())
    }

    pub async fn delete_user(&self, actor: Option<&Actor>, target_id: &str) -> Result<PublicUser> {
        authorize_all(
            actor,
            &[
                Requirement::RequireRole(Role::Admin),
                Requirement::ForbidSelf(target_id),
            ],
        )?;
        let actor = actor.ok_or(AppError::Unauthorized)?;

        let target = self.load_target(target_id).await?;

        if !self.user_service.delete_user(target_id).await? {
            // removed by a concurrent request between lookup and delete
            return Err(AppError::NotFound("User not found".to_string()));
        }

        self.audit
            .record(
                ActivityType::UserDeleted,
                &target.id,
                format!("Deleted user {} ({})", target.email, target.role),
                Some(&actor.id),
            )
            .await;

        Ok(target.into())
    }

    pub async fn list_activities(
        &self,
        actor: Option<&Actor>,
        limit: Option<&str>,
    ) -> Result<(Vec<Activity>, i64)> {
        authorize(actor, Requirement::RequireRole(Role::Admin))?;

        let limit = clamp_limit(parse_number("limit", limit)?);
        let activities = self.audit.recent(limit).await?;
        Ok((activities, limit))
    }
}
