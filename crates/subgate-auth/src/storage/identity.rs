//! Identity store trait.
//!
//! Identities live in the relational store owned by the account layer. The
//! session engine reads them and bumps their token version; nothing else.

use async_trait::async_trait;

use super::StorageResult;
use crate::types::Identity;

/// Read access to identities, plus the token-version bump.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Finds an identity by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable. A missing identity is
    /// `Ok(None)`, not an error.
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Identity>>;

    /// Finds an identity by email (exact match after trimming).
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Identity>>;

    /// Increments the identity's token version and returns the new value.
    ///
    /// Every credential carrying an older version stops being refreshable.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity does not exist or the store is
    /// unavailable.
    async fn increment_token_version(&self, id: i64) -> StorageResult<i64>;
}
