//! # subgate-auth
//!
//! Session token lifecycle for the Subgate account backend.
//!
//! This crate provides:
//! - Signed, self-contained access tokens (HMAC JWT)
//! - Single-use refresh tokens with rotation, reuse detection and family revocation
//! - A session service composing both for login, refresh, logout and password changes
//!
//! ## Overview
//!
//! Access tokens are short-lived and never stored. Refresh tokens are
//! long-lived, stored only as hashes, and replaced on every use. Each
//! identity carries a token version; bumping it makes every earlier
//! credential unrefreshable.
//!
//! ## Modules
//!
//! - [`config`] - Lifetimes, signing secret and store timeout
//! - [`token`] - Access token codec and refresh token issuer
//! - [`session`] - Session lifecycle service
//! - [`storage`] - Credential and identity store contracts plus in-memory stores
//! - [`types`] - Identities, refresh token records and token pairs
//! - [`password`] - Argon2 password hashing

pub mod config;
pub mod error;
pub mod password;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, ConfigError, JwtConfig, SessionConfig};
pub use error::{AuthError, ErrorCategory, TokenKind};
pub use session::{Credentials, SessionService};
pub use storage::{
    CredentialStore, IdentityStore, MemoryCredentialStore, MemoryIdentityStore, StorageError,
    StorageResult,
};
pub use token::{AccessClaims, AccessTokenCodec, RefreshRecords, RefreshTokenIssuer, Validated};
pub use types::{
    AccessToken, Identity, IdentityStatus, RefreshTokenRecord, Role, SessionInfo, TokenPair,
};

/// Type alias for session token results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use subgate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::AuthConfig;
    pub use crate::error::{AuthError, TokenKind};
    pub use crate::session::{Credentials, SessionService};
    pub use crate::storage::{CredentialStore, IdentityStore};
    pub use crate::types::{AccessToken, Identity, Role, TokenPair};
}
