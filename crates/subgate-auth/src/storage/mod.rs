//! Storage contracts consumed by the token lifecycle.
//!
//! This module defines:
//!
//! - [`CredentialStore`] - key-value store with per-key TTL holding refresh
//!   token records and their per-user / per-family index sets
//! - [`IdentityStore`] - read access to identities plus the token-version bump
//!
//! # Implementations
//!
//! - [`memory`] - in-process stores backed by `DashMap`
//! - `subgate-auth-redis` - Redis credential store

pub mod credential;
pub mod identity;
pub mod memory;

use std::future::Future;
use std::time::Duration;

pub use credential::CredentialStore;
pub use identity::IdentityStore;
pub use memory::{MemoryCredentialStore, MemoryIdentityStore};

/// Errors reported by store implementations.
///
/// All of these are infrastructure failures; none of them say anything about
/// whether a token is valid.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the command.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the backend failure.
        message: String,
    },

    /// The call did not complete within the configured bound.
    #[error("Store operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Operation name, for logs.
        operation: &'static str,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }
}

/// Type alias for store results.
pub type StorageResult<T> = Result<T, StorageError>;

/// Runs a store call, failing with [`StorageError::Timeout`] once `timeout` elapses.
///
/// Dropping the returned future cancels the underlying call.
pub async fn bounded<T, F>(operation: &'static str, timeout: Duration, call: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::timeout(operation, timeout)),
    }
}
