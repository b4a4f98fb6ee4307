//! Credential store trait.
//!
//! The refresh token rotator keeps three kinds of keys in this store:
//!
//! - the canonical record, keyed by the SHA-256 hash of the raw token
//! - a per-user set of live token hashes
//! - a per-family set of live token hashes
//!
//! # Security Considerations
//!
//! - Raw refresh tokens never reach the store, only their hashes
//! - [`CredentialStore::take`] must be atomic: two concurrent takes of the
//!   same key may not both observe the value
//! - Expiry is the store's job; the core runs no sweeper

use std::time::Duration;

use async_trait::async_trait;

use super::StorageResult;

/// Key-value store with per-key TTL and string sets.
///
/// # Implementations
///
/// - [`MemoryCredentialStore`](super::MemoryCredentialStore) - single process
/// - `subgate-auth-redis` - shared across instances
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StorageResult<()>;

    /// Reads the value under `key`.
    ///
    /// Returns `None` if the key is absent or its TTL has elapsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Atomically reads and deletes the value under `key`.
    ///
    /// Of any number of concurrent callers, at most one receives `Some`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn take(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Deletes `key`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Adds `member` to the set at `set_key` and sets the set's TTL to `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn add_to_set(&self, set_key: &str, member: &str, ttl: Duration) -> StorageResult<()>;

    /// Removes `member` from the set at `set_key`. Missing members are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn remove_from_set(&self, set_key: &str, member: &str) -> StorageResult<()>;

    /// Lists the members of the set at `set_key`. Absent sets are empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn members(&self, set_key: &str) -> StorageResult<Vec<String>>;

    /// Deletes the set at `set_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn delete_set(&self, set_key: &str) -> StorageResult<()>;

    /// Returns the remaining lifetime of `key`.
    ///
    /// `None` means the key is absent or has no expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn ttl_remaining(&self, key: &str) -> StorageResult<Option<Duration>>;
}
