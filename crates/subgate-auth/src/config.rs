//! Session token configuration.
//!
//! Loaded once at startup and injected into the codec, the rotator and the
//! session service. Rotating the signing secret means restarting with new
//! configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum signing secret length in bytes for HMAC-SHA256.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Default access token size budget in bytes.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 8192;

/// Upper bound for access and refresh token lifetimes (ten years).
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(3650 * 24 * 3600);

/// Upper bound for how long expired refresh records are retained.
pub const MAX_EXPIRED_RETENTION: Duration = Duration::from_secs(365 * 24 * 3600);

/// Root session token configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth.jwt]
/// secret = "change-me-to-at-least-32-bytes-of-entropy"
/// access_token_expire_minutes = 15
/// refresh_token_expire_days = 30
///
/// [auth.sessions]
/// store_timeout = "3s"
/// expired_retention = "7d"
/// legacy_refresh_enabled = true
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token signing and lifetimes.
    pub jwt: JwtConfig,

    /// Session service behaviour.
    pub sessions: SessionConfig,
}

/// Token signing and lifetime configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Shared HMAC secret.
    pub secret: String,

    /// Access token lifetime in minutes. Takes precedence over `expire_hour`
    /// when greater than zero.
    pub access_token_expire_minutes: u64,

    /// Legacy access token lifetime in hours.
    pub expire_hour: u64,

    /// Refresh token lifetime in days.
    pub refresh_token_expire_days: u64,

    /// Access tokens longer than this are rejected before parsing.
    pub max_token_length: usize,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_expire_minutes: 0,
            expire_hour: 24,
            refresh_token_expire_days: 30,
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[redacted]")
            .field(
                "access_token_expire_minutes",
                &self.access_token_expire_minutes,
            )
            .field("expire_hour", &self.expire_hour)
            .field("refresh_token_expire_days", &self.refresh_token_expire_days)
            .field("max_token_length", &self.max_token_length)
            .finish()
    }
}

/// Session service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound for every credential-store and identity-store call.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,

    /// How long a refresh record is kept after it expires, so presenting it
    /// still reports `Expired` rather than an unknown token.
    #[serde(with = "humantime_serde")]
    pub expired_retention: Duration,

    /// Allow refreshing with an (expired) access token instead of a refresh token.
    ///
    /// This path has no rotation and no reuse detection.
    pub legacy_refresh_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(3),
            expired_retention: Duration::from_secs(7 * 24 * 3600),
            legacy_refresh_enabled: true,
        }
    }
}

impl AuthConfig {
    /// Creates a configuration with the given secret and default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt: JwtConfig {
                secret: secret.into(),
                ..JwtConfig::default()
            },
            sessions: SessionConfig::default(),
        }
    }

    /// Access token lifetime. Minutes win over the legacy hours setting.
    #[must_use]
    pub fn access_token_lifetime(&self) -> Duration {
        if self.jwt.access_token_expire_minutes > 0 {
            Duration::from_secs(self.jwt.access_token_expire_minutes.saturating_mul(60))
        } else {
            Duration::from_secs(self.jwt.expire_hour.saturating_mul(3600))
        }
    }

    /// Access token lifetime in seconds, for client refresh timers.
    #[must_use]
    pub fn access_token_expires_in(&self) -> u64 {
        self.access_token_lifetime().as_secs()
    }

    /// Refresh token lifetime.
    #[must_use]
    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.jwt.refresh_token_expire_days.saturating_mul(24 * 3600))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any value is missing or out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.is_empty() {
            return Err(ConfigError::Missing("jwt.secret".to_string()));
        }

        if self.jwt.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {MIN_SECRET_LENGTH} bytes, got {}",
                self.jwt.secret.len()
            )));
        }

        if self.access_token_lifetime().is_zero() {
            return Err(ConfigError::InvalidValue(
                "access token lifetime must be > 0 (set access_token_expire_minutes or expire_hour)"
                    .to_string(),
            ));
        }

        if self.access_token_lifetime() > MAX_TOKEN_LIFETIME {
            return Err(ConfigError::InvalidValue(format!(
                "access token lifetime must be at most {} days",
                MAX_TOKEN_LIFETIME.as_secs() / 86400
            )));
        }

        if self.jwt.refresh_token_expire_days == 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expire_days must be > 0".to_string(),
            ));
        }

        if self.refresh_token_lifetime() > MAX_TOKEN_LIFETIME {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.refresh_token_expire_days must be at most {}",
                MAX_TOKEN_LIFETIME.as_secs() / 86400
            )));
        }

        if self.jwt.max_token_length == 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.max_token_length must be > 0".to_string(),
            ));
        }

        if self.sessions.store_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "sessions.store_timeout must be > 0".to_string(),
            ));
        }

        if self.sessions.expired_retention > MAX_EXPIRED_RETENTION {
            return Err(ConfigError::InvalidValue(format!(
                "sessions.expired_retention must be at most {} days",
                MAX_EXPIRED_RETENTION.as_secs() / 86400
            )));
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}
