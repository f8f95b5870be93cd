use crate::services::verification_service::{
    VerificationConfig, DEFAULT_RESEND_INTERVAL_SECS, DEFAULT_TOKEN_TTL_HOURS,
};
use std::env;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    /// Public origin used to build links in outgoing mail.
    pub base_url: String,
    pub token_ttl_hours: i64,
    pub resend_interval_secs: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let host = parse_var("HOST", "127.0.0.1")?;
        let port = parse_var("PORT", "8080")?;

        let base_url = env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        let token_ttl_hours: i64 =
            parse_var("VERIFICATION_TOKEN_TTL_HOURS", &DEFAULT_TOKEN_TTL_HOURS.to_string())?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "VERIFICATION_TOKEN_TTL_HOURS",
                value: token_ttl_hours.to_string(),
            });
        }

        let resend_interval_secs: i64 = parse_var(
            "VERIFICATION_RESEND_INTERVAL_SECS",
            &DEFAULT_RESEND_INTERVAL_SECS.to_string(),
        )?;
        if resend_interval_secs < 0 {
            return Err(ConfigError::Invalid {
                key: "VERIFICATION_RESEND_INTERVAL_SECS",
                value: resend_interval_secs.to_string(),
            });
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            token_ttl_hours,
            resend_interval_secs,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn verification(&self) -> VerificationConfig {
        VerificationConfig {
            base_url: self.base_url.clone(),
            token_ttl: chrono::Duration::hours(self.token_ttl_hours),
            resend_interval: chrono::Duration::seconds(self.resend_interval_secs),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
