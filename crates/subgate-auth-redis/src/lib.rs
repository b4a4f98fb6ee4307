//! Redis storage backend for Subgate Auth
//!
//! Implements [`subgate_auth::CredentialStore`] on a deadpool connection
//! pool so refresh tokens survive restarts and are shared between
//! instances.
//!
//! - Records are plain string keys written with `SET .. PX`
//! - Redemption uses `GETDEL`, which makes single use atomic across instances
//! - Index sets are Redis sets whose expiry is refreshed on every insert
//!
//! # Example
//!
//! ```ignore
//! use subgate_auth_redis::{RedisCredentialStore, RedisStoreConfig};
//!
//! let store = RedisCredentialStore::connect(&RedisStoreConfig::default()).await?;
//! let service = SessionService::new(config, Arc::new(store), identities)?;
//! ```

pub mod config;
pub mod store;

pub use config::RedisStoreConfig;
pub use store::RedisCredentialStore;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while setting up the Redis backend.
///
/// Runtime failures are reported through
/// [`subgate_auth::StorageError::Unavailable`] instead.
#[derive(Debug, thiserror::Error)]
pub enum RedisStoreError {
    /// The pool could not be built from the configuration.
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    /// No connection could be checked out of the pool.
    #[error("Failed to connect to Redis: {0}")]
    Connect(#[from] deadpool_redis::PoolError),

    /// A command failed during the startup check.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
