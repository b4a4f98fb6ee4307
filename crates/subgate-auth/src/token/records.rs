//! Typed access to refresh token records and their index sets.
//!
//! Wraps a [`CredentialStore`] with the key layout, JSON encoding and the
//! per-call timeout. Protocol decisions (what a missing record means, when a
//! family is destroyed) live in [`super::refresh`].

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::storage::{CredentialStore, StorageError, StorageResult, bounded};
use crate::types::RefreshTokenRecord;

/// Key of the canonical record for a token hash.
#[must_use]
pub fn record_key(token_hash: &str) -> String {
    format!("refresh_token:{token_hash}")
}

/// Key of the set of live token hashes owned by an identity.
#[must_use]
pub fn user_set_key(user_id: i64) -> String {
    format!("user_refresh_tokens:{user_id}")
}

/// Key of the set of live token hashes in a family.
#[must_use]
pub fn family_set_key(family_id: &str) -> String {
    format!("token_family:{family_id}")
}

/// Key of the marker left behind when a record is removed by bulk revocation.
#[must_use]
pub fn revoked_key(token_hash: &str) -> String {
    format!("revoked_refresh_token:{token_hash}")
}

/// Shortened hash for log lines.
pub(crate) fn short_hash(token_hash: &str) -> &str {
    token_hash.get(..8).unwrap_or(token_hash)
}

/// Refresh token records over a credential store.
#[derive(Clone)]
pub struct RefreshRecords {
    store: Arc<dyn CredentialStore>,
    timeout: Duration,
    retention: Duration,
}

impl RefreshRecords {
    /// Creates a record view; every store call is bounded by `timeout`.
    ///
    /// Expired records are not retained until [`with_retention`](Self::with_retention)
    /// says otherwise.
    pub fn new(store: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            retention: Duration::ZERO,
        }
    }

    /// Keeps records and revocation markers for `retention` past expiry.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// How long records outlive their expiry.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Writes the canonical record.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the store is unavailable.
    pub async fn save(
        &self,
        token_hash: &str,
        record: &RefreshTokenRecord,
        ttl: Duration,
    ) -> StorageResult<()> {
        let value = serde_json::to_vec(record)?;
        let key = record_key(token_hash);
        bounded("put", self.timeout, self.store.put(&key, value, ttl)).await
    }

    /// Reads a record without consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the value is corrupt.
    pub async fn get(&self, token_hash: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        let key = record_key(token_hash);
        let value = bounded("get", self.timeout, self.store.get(&key)).await?;
        value.map(|bytes| decode(&bytes)).transpose()
    }

    /// Atomically reads and deletes a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable. A corrupt value is
    /// reported as [`StorageError::Serialization`]; it has been deleted either way.
    pub async fn take(&self, token_hash: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        let key = record_key(token_hash);
        let value = bounded("take", self.timeout, self.store.take(&key)).await?;
        value.map(|bytes| decode(&bytes)).transpose()
    }

    /// Deletes a record. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn delete(&self, token_hash: &str) -> StorageResult<bool> {
        let key = record_key(token_hash);
        bounded("delete", self.timeout, self.store.delete(&key)).await
    }

    /// Adds the hash to the user and family sets.
    ///
    /// Best-effort: failures are logged and swallowed. The canonical record
    /// alone decides point redemption.
    pub async fn index(&self, token_hash: &str, record: &RefreshTokenRecord, ttl: Duration) {
        let sets = [
            user_set_key(record.user_id),
            family_set_key(&record.family_id),
        ];
        for set_key in &sets {
            if let Err(e) = self.add_to_set(set_key, token_hash, ttl).await {
                tracing::warn!(
                    set = %set_key,
                    token = short_hash(token_hash),
                    error = %e,
                    "failed to index refresh token"
                );
            }
        }
    }

    /// Removes the hash from the user and family sets. Best-effort.
    pub async fn unindex(&self, token_hash: &str, record: &RefreshTokenRecord) {
        let sets = [
            user_set_key(record.user_id),
            family_set_key(&record.family_id),
        ];
        for set_key in &sets {
            let removed = bounded(
                "remove_from_set",
                self.timeout,
                self.store.remove_from_set(set_key, token_hash),
            )
            .await;
            if let Err(e) = removed {
                tracing::debug!(set = %set_key, error = %e, "failed to unindex refresh token");
            }
        }
    }

    /// Deletes every record owned by `user_id`, then the user set. Returns
    /// how many of them had not yet expired.
    ///
    /// Each deleted record leaves a revocation marker holding the record, kept
    /// as long as the record itself would have been, so a later presentation
    /// can be told apart from replay of a rotated token.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn revoke_user(&self, user_id: i64) -> StorageResult<usize> {
        let set_key = user_set_key(user_id);
        let hashes = bounded("members", self.timeout, self.store.members(&set_key)).await?;
        let now = OffsetDateTime::now_utc();

        let mut revoked = 0;
        for hash in &hashes {
            let record = match self.take(hash).await {
                Ok(Some(record)) => record,
                Ok(None) | Err(StorageError::Serialization(_)) => continue,
                Err(e) => return Err(e),
            };
            if !record.is_expired_at(now) {
                revoked += 1;
            }
            self.unindex(hash, &record).await;
            if let Some(ttl) = record.retained_at(now, self.retention) {
                self.mark_revoked(hash, &record, ttl).await;
            }
        }

        bounded("delete_set", self.timeout, self.store.delete_set(&set_key)).await?;
        Ok(revoked)
    }

    /// Returns the record removed by [`revoke_user`](Self::revoke_user) for
    /// `token_hash`, while its marker is still held.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the marker is corrupt.
    pub async fn revoked(&self, token_hash: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        let key = revoked_key(token_hash);
        let marker = bounded("get", self.timeout, self.store.get(&key)).await?;
        marker.map(|bytes| decode(&bytes)).transpose()
    }

    /// Deletes every record in `family_id`, then the family set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn destroy_family(&self, family_id: &str) -> StorageResult<usize> {
        self.purge_set(&family_set_key(family_id)).await
    }

    /// Lists the live records owned by `user_id`, oldest first.
    ///
    /// Index members whose record is gone, unreadable or expired are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn list_user(&self, user_id: i64) -> StorageResult<Vec<RefreshTokenRecord>> {
        let set_key = user_set_key(user_id);
        let hashes = bounded("members", self.timeout, self.store.members(&set_key)).await?;

        let now = OffsetDateTime::now_utc();
        let mut records = Vec::with_capacity(hashes.len());
        for hash in &hashes {
            match self.get(hash).await {
                Ok(Some(record)) if !record.is_expired_at(now) => records.push(record),
                Ok(_) => {}
                Err(StorageError::Serialization(e)) => {
                    tracing::warn!(
                        token = short_hash(hash),
                        error = %e,
                        "skipping unreadable refresh token record"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    // Best-effort: without the marker a revoked token reads as unknown.
    async fn mark_revoked(&self, token_hash: &str, record: &RefreshTokenRecord, ttl: Duration) {
        let key = revoked_key(token_hash);
        let value = match serde_json::to_vec(record) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode revocation marker");
                return;
            }
        };
        if let Err(e) = bounded("put", self.timeout, self.store.put(&key, value, ttl)).await {
            tracing::warn!(
                token = short_hash(token_hash),
                error = %e,
                "failed to write revocation marker"
            );
        }
    }

    // The set never expires before its youngest member.
    async fn add_to_set(
        &self,
        set_key: &str,
        token_hash: &str,
        ttl: Duration,
    ) -> StorageResult<()> {
        let remaining = bounded(
            "ttl_remaining",
            self.timeout,
            self.store.ttl_remaining(set_key),
        )
        .await?
        .unwrap_or_default();

        bounded(
            "add_to_set",
            self.timeout,
            self.store.add_to_set(set_key, token_hash, ttl.max(remaining)),
        )
        .await
    }

    async fn purge_set(&self, set_key: &str) -> StorageResult<usize> {
        let hashes = bounded("members", self.timeout, self.store.members(set_key)).await?;

        let mut deleted = 0;
        for hash in &hashes {
            if self.delete(hash).await? {
                deleted += 1;
            }
        }

        bounded("delete_set", self.timeout, self.store.delete_set(set_key)).await?;
        Ok(deleted)
    }
}

fn decode(bytes: &[u8]) -> StorageResult<RefreshTokenRecord> {
    Ok(serde_json::from_slice(bytes)?)
}
