#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use tutorhub::{
    build_router,
    config::session::{session_store, SessionConfig},
    models::Role,
    services::VerificationConfig,
    test_utils::test_helpers::{self, RecordingEmailService},
    AppState,
};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: sqlx::SqlitePool,
    pub mailer: RecordingEmailService,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = test_helpers::create_test_db().await.unwrap();
        let mailer = RecordingEmailService::new();
        let state = AppState::new(
            pool.clone(),
            Arc::new(mailer.clone()),
            VerificationConfig::default(),
        );

        let store = session_store(pool.clone()).await.unwrap();
        let router = build_router(
            state.clone(),
            SessionConfig::development().create_layer(store),
        );

        Self {
            router,
            state,
            pool,
            mailer,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Inserts a verified user with `role` and returns its id.
    pub async fn create_user(&self, email: &str, role: Role) -> String {
        test_helpers::insert_test_user(&self.pool, email, PASSWORD, role, true)
            .await
            .unwrap()
    }

    /// Logs in and returns the `name=value` pair of the session cookie.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);

        let set_cookie = response
            .headers
            .get(header::SET_COOKIE)
            .expect("session cookie to be issued")
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    /// Creates a verified admin and returns `(id, cookie)`.
    pub async fn admin_session(&self, email: &str) -> (String, String) {
        let id = self.create_user(email, Role::Admin).await;
        let cookie = self.login(email).await;
        (id, cookie)
    }

    pub async fn activity_count(&self) -> i64 {
        test_helpers::count_activities(&self.pool).await.unwrap()
    }
}

/// Asserts a serialized user carries no credential material.
pub fn assert_no_secrets(user: &Value) {
    let object = user.as_object().expect("user to be an object");
    for key in [
        "password_hash",
        "passwordHash",
        "verification_token",
        "verificationToken",
        "verification_token_expires_at",
    ] {
        assert!(!object.contains_key(key), "user exposes {key}: {user}");
    }
}
