//! Session token error types.
//!
//! Every failure the token lifecycle can report is one of these variants.
//! Security outcomes (`Invalid`, `Revoked`, `Expired`) are kept apart from
//! infrastructure failures (`ServiceUnavailable`) so an outage never reads
//! as a forged token and a forged token never reads as an outage.

use std::fmt;

use crate::storage::StorageError;

/// Which credential an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived signed access token.
    Access,
    /// Long-lived, store-tracked refresh token.
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access token"),
            Self::Refresh => write!(f, "refresh token"),
        }
    }
}

/// Errors produced by the token codec, the refresh rotator and the session service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token is structurally invalid or uses a disallowed algorithm.
    #[error("Malformed token")]
    Malformed,

    /// The token is past its expiry.
    #[error("{kind} has expired")]
    Expired {
        /// Which token expired.
        kind: TokenKind,
    },

    /// Signature mismatch, unknown refresh token or wrong prefix.
    ///
    /// Deliberately carries no detail.
    #[error("Invalid {kind}")]
    Invalid {
        /// Which token was rejected.
        kind: TokenKind,
    },

    /// The identity's credentials were invalidated after the token was issued.
    #[error("Token has been revoked")]
    Revoked,

    /// The identity exists but is disabled.
    #[error("User is not active")]
    NotActive,

    /// The token exceeds the configured size budget and was not parsed.
    #[error("Token too large: {length} bytes exceeds limit of {limit}")]
    TooLarge {
        /// Length of the presented token in bytes.
        length: usize,
        /// Configured byte budget.
        limit: usize,
    },

    /// A credential store or identity store call failed or timed out.
    #[error("Service temporarily unavailable: {message}")]
    ServiceUnavailable {
        /// Description of the underlying failure. Not meant for end users.
        message: String,
    },

    /// Unknown email or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The single-token refresh path is switched off by configuration.
    #[error("Access-token refresh is disabled; use a refresh token")]
    LegacyRefreshDisabled,

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Expired` error.
    #[must_use]
    pub fn expired(kind: TokenKind) -> Self {
        Self::Expired { kind }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(kind: TokenKind) -> Self {
        Self::Invalid { kind }
    }

    /// Creates a new `TooLarge` error.
    #[must_use]
    pub fn too_large(length: usize, limit: usize) -> Self {
        Self::TooLarge { length, limit }
    }

    /// Creates a new `ServiceUnavailable` error.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller presented something unacceptable (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Malformed
                | Self::Expired { .. }
                | Self::Invalid { .. }
                | Self::Revoked
                | Self::NotActive
                | Self::TooLarge { .. }
                | Self::InvalidCredentials
                | Self::LegacyRefreshDisabled
        )
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }

    /// Returns `true` if the client should discard its session and log in again.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Expired {
                kind: TokenKind::Refresh
            } | Self::Invalid {
                kind: TokenKind::Refresh
            } | Self::Revoked
                | Self::NotActive
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Malformed => ErrorCategory::Token,
            Self::Expired { .. } => ErrorCategory::Token,
            Self::Invalid { .. } => ErrorCategory::Token,
            Self::Revoked => ErrorCategory::Token,
            Self::TooLarge { .. } => ErrorCategory::Validation,
            Self::NotActive => ErrorCategory::Authentication,
            Self::InvalidCredentials => ErrorCategory::Authentication,
            Self::LegacyRefreshDisabled => ErrorCategory::Validation,
            Self::ServiceUnavailable { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed => "INVALID_TOKEN",
            Self::Expired {
                kind: TokenKind::Access,
            } => "TOKEN_EXPIRED",
            Self::Expired {
                kind: TokenKind::Refresh,
            } => "REFRESH_TOKEN_EXPIRED",
            Self::Invalid {
                kind: TokenKind::Access,
            } => "INVALID_TOKEN",
            Self::Invalid {
                kind: TokenKind::Refresh,
            } => "REFRESH_TOKEN_INVALID",
            Self::Revoked => "TOKEN_REVOKED",
            Self::NotActive => "USER_NOT_ACTIVE",
            Self::TooLarge { .. } => "TOKEN_TOO_LARGE",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::LegacyRefreshDisabled => "REFRESH_DISABLED",
            Self::Configuration { .. } => "INTERNAL_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::service_unavailable(err.to_string())
    }
}

/// Logs a store failure and converts it to `ServiceUnavailable`.
pub(crate) fn unavailable(operation: &'static str, err: StorageError) -> AuthError {
    tracing::error!(operation, error = %err, "store failure");
    AuthError::from(err)
}

/// Categories of session errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credential or account status checks.
    Authentication,
    /// Token validation, expiry and revocation.
    Token,
    /// Request validation errors.
    Validation,
    /// Store and identity-store failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
