//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! Gateway, webhook and reconciler settings live in `payments.toml`, whose
//! location can be overridden with `PAYMENTS_CONFIG`.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Default signing secret for local development.
const DEV_JWT_SECRET: &str = "turnstile-dev-secret-change-in-production";

/// Shortest secret accepted for signing bearer tokens.
const MIN_JWT_SECRET_LEN: usize = 16;

/// API process configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// Interface to bind
    pub bind_addr: IpAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Secret for signing and validating bearer tokens
    pub jwt_secret: String,

    /// Bearer token lifetime in seconds
    pub jwt_lifetime_secs: i64,

    /// Explicit `payments.toml` location
    pub payments_config: Option<PathBuf>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            http_port: parse_var("HTTP_PORT", "8080")?,
            bind_addr: parse_var("BIND_ADDR", "0.0.0.0")?,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "turnstile.db".to_string())
                .into(),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string()),
            jwt_lifetime_secs: parse_var("JWT_LIFETIME_SECS", "3600")?,
            payments_config: env::var("PAYMENTS_CONFIG").ok().map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue("JWT_SECRET".to_string()));
        }
        if self.jwt_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("JWT_LIFETIME_SECS".to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }

    /// True when running with the built-in development secret.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            http_port: 8080,
            bind_addr: "127.0.0.1".parse().unwrap(),
            database_path: "turnstile.db".into(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_lifetime_secs: 3600,
            payments_config: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        assert_eq!(config().socket_addr().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = config();
        config.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(name)) if name == "JWT_SECRET"));
    }

    #[test]
    fn test_non_positive_lifetime_rejected() {
        let mut config = config();
        config.jwt_lifetime_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dev_secret_detected() {
        assert!(config().uses_dev_secret());
    }
}
