use std::env;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512};
use sqlx::SqlitePool;
use time::Duration;
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer,
};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::warn;

pub const SESSION_TABLE: &str = "sessions";

/// Signed cookie layer over the SQLite session store.
pub type SessionLayer = SessionManagerLayer<SqliteStore, SignedCookie>;

#[derive(Debug, thiserror::Error)]
pub enum SessionConfigError {
    #[error("Production environment requires HTTPS. Set FORCE_HTTPS=true")]
    HttpsRequired,
    #[error("SESSION_SECRET must be set in production")]
    MissingSecret,
    #[error("SESSION_SECRET must be at least 64 bytes in production")]
    SecretTooShort,
    #[error("SESSION_SECRET appears to be a default value")]
    DefaultSecret,
    #[error("Session store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub expiry: Duration,
    pub name: String,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        if is_production() {
            Self::production()
        } else {
            Self::development()
        }
    }

    pub fn production() -> Self {
        SessionConfig {
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
            expiry: Duration::hours(2),
            name: "__Host-session".to_string(),
        }
    }

    pub fn development() -> Self {
        SessionConfig {
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            expiry: Duration::days(7),
            name: "session".to_string(),
        }
    }

    pub fn create_layer(&self, store: SqliteStore) -> SessionLayer {
        let key = load_session_key();

        SessionManagerLayer::new(store)
            .with_secure(self.secure)
            .with_http_only(self.http_only)
            .with_same_site(self.same_site)
            .with_name(self.name.clone())
            .with_expiry(Expiry::OnInactivity(self.expiry))
            .with_signed(key)
    }
}

/// Creates the session table on `pool` if needed and returns the store.
pub async fn session_store(pool: SqlitePool) -> Result<SqliteStore, SessionConfigError> {
    let store = SqliteStore::new(pool)
        .with_table_name(SESSION_TABLE)
        .map_err(|e| SessionConfigError::Store(e.to_string()))?;
    store
        .migrate()
        .await
        .map_err(|e| SessionConfigError::Store(e.to_string()))?;
    Ok(store)
}

/// Refuses to start a production deployment with insecure session settings.
/// Outside production this is a no-op.
pub fn validate_production_config() -> Result<(), SessionConfigError> {
    if !is_production() {
        return Ok(());
    }

    if !env_flag_enabled("FORCE_HTTPS") {
        return Err(SessionConfigError::HttpsRequired);
    }

    let secret = env::var("SESSION_SECRET").map_err(|_| SessionConfigError::MissingSecret)?;
    if decode_secret_bytes(&secret).len() < 64 {
        return Err(SessionConfigError::SecretTooShort);
    }

    let lowered = secret.to_ascii_lowercase();
    if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default") {
        return Err(SessionConfigError::DefaultSecret);
    }

    Ok(())
}

fn is_production() -> bool {
    env::var("ENVIRONMENT")
        .map(|value| value == "production")
        .unwrap_or(false)
}

fn env_flag_enabled(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

fn load_session_key() -> Key {
    match env::var("SESSION_SECRET") {
        Ok(secret) if !secret.is_empty() => key_from_secret_bytes(&decode_secret_bytes(&secret)),
        _ => {
            warn!("SESSION_SECRET not set; generating ephemeral key (development only)");
            Key::generate()
        }
    }
}

fn decode_secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}

fn key_from_secret_bytes(bytes: &[u8]) -> Key {
    if bytes.len() >= 64 {
        Key::from(&bytes[..64])
    } else {
        let digest = Sha512::digest(bytes);
        Key::from(digest.as_slice())
    }
}
