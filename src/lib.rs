pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use config::session::SessionLayer;
use repositories::{
    ActivityRepository, SqliteActivityRepository, SqliteUserRepository, UserRepository,
};
use services::{
    AdminService, AuditService, AuthService, EmailService, UserService, VerificationConfig,
    VerificationService,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub verification_service: Arc<VerificationService>,
    pub audit_service: Arc<AuditService>,
    pub admin_service: Arc<AdminService>,
    pub user_repository: Arc<dyn UserRepository>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires repositories and services over `pool`.
    pub fn new(
        pool: sqlx::SqlitePool,
        email_service: Arc<dyn EmailService>,
        verification: VerificationConfig,
    ) -> Self {
        let user_repository: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(pool.clone()));
        let activity_repository: Arc<dyn ActivityRepository> =
            Arc::new(SqliteActivityRepository::new(pool.clone()));

        let user_service = Arc::new(UserService::new(user_repository.clone()));
        let auth_service = Arc::new(AuthService::new(user_repository.clone()));
        let audit_service = Arc::new(AuditService::new(activity_repository));
        let verification_service = Arc::new(VerificationService::new(
            user_repository.clone(),
            user_service.clone(),
            audit_service.clone(),
            email_service,
            verification,
        ));
        let admin_service = Arc::new(AdminService::new(
            user_service.clone(),
            audit_service.clone(),
        ));

        Self {
            user_service,
            auth_service,
            verification_service,
            audit_service,
            admin_service,
            user_repository,
            pool,
        }
    }
}

/// Builds the full HTTP surface. The binary and the router tests share it.
pub fn build_router(state: AppState, session_layer: SessionLayer) -> Router {
    let admin_routes = Router::new()
        .route("/admin/users", get(handlers::list_users_handler))
        .route("/admin/users/{id}", axum::routing::delete(handlers::delete_user_handler))
        .route("/admin/users/{id}/role", put(handlers::change_role_handler))
        .route("/admin/users/{id}/verify", post(handlers::verify_user_handler))
        .route("/admin/activities", get(handlers::list_activities_handler))
        .layer(axum_middleware::from_fn(auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/auth/register", post(auth::handlers::register_handler))
        .route("/auth/login", post(auth::handlers::login_handler))
        .route("/auth/logout", post(auth::handlers::logout_handler))
        .route("/auth/me", get(auth::handlers::me_handler))
        .route("/auth/verify", post(auth::handlers::verify_token_handler))
        .route(
            "/auth/verify/{token}",
            get(auth::handlers::verify_link_handler),
        )
        .route(
            "/auth/resend-verification",
            post(auth::handlers::resend_verification_handler),
        )
        .merge(admin_routes)
        .layer(session_layer)
        .layer(axum_middleware::from_fn(middleware::add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
