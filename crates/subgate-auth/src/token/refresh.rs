//! Refresh token issuance and rotation.
//!
//! Refresh tokens are single use. Redeeming one atomically takes its record
//! out of the store and issues a successor in the same family, so a second
//! presentation of the same raw token finds nothing. That absence is the
//! reuse signal.
//!
//! Records outlive their expiry by the configured retention, so an aged
//! token keeps reporting `Expired` instead of looking unknown.
//!
//! A family is destroyed wholesale when redemption shows the lineage can no
//! longer be trusted: the identity is gone, disabled, or its token version
//! has moved on.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use super::jwt::AccessTokenCodec;
use super::records::{RefreshRecords, short_hash};
use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::{AuthError, TokenKind, unavailable};
use crate::storage::{CredentialStore, IdentityStore, StorageError, bounded};
use crate::types::{
    Identity, RefreshTokenRecord, SessionInfo, TokenPair, generate_family_id,
    generate_refresh_token, has_refresh_prefix, hash_token,
};

/// Mints, redeems and retires refresh tokens.
pub struct RefreshTokenIssuer {
    records: RefreshRecords,
    identities: Arc<dyn IdentityStore>,
    codec: Arc<AccessTokenCodec>,
    ttl: Duration,
    expires_in: u64,
    timeout: Duration,
}

impl RefreshTokenIssuer {
    /// Creates an issuer over the given stores.
    pub fn new(
        config: &AuthConfig,
        codec: Arc<AccessTokenCodec>,
        store: Arc<dyn CredentialStore>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        let timeout = config.sessions.store_timeout;
        Self {
            records: RefreshRecords::new(store, timeout)
                .with_retention(config.sessions.expired_retention),
            identities,
            codec,
            ttl: config.refresh_token_lifetime(),
            expires_in: config.access_token_expires_in(),
            timeout,
        }
    }

    /// Overrides the configured refresh token lifetime.
    #[must_use]
    pub fn with_lifetime(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Typed view of the underlying records.
    #[must_use]
    pub fn records(&self) -> &RefreshRecords {
        &self.records
    }

    /// Issues a refresh token for `identity`.
    ///
    /// Starts a new family when `family_id` is `None`. Returns the raw token,
    /// which is not retrievable again.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the canonical record cannot be written,
    /// and `Configuration` if the lifetime does not fit a timestamp.
    /// Index write failures are logged only.
    pub async fn issue(&self, identity: &Identity, family_id: Option<&str>) -> AuthResult<String> {
        let raw = generate_refresh_token();
        let token_hash = hash_token(&raw);
        let now = OffsetDateTime::now_utc();
        let expires_at = time::Duration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| AuthError::configuration("refresh token lifetime out of range"))?;
        let record = RefreshTokenRecord {
            user_id: identity.id,
            token_version: identity.token_version,
            family_id: family_id.map_or_else(generate_family_id, str::to_string),
            created_at: now,
            expires_at,
        };

        let store_ttl = self.ttl.saturating_add(self.records.retention());
        self.records
            .save(&token_hash, &record, store_ttl)
            .await
            .map_err(|e| unavailable("save refresh token", e))?;
        self.records.index(&token_hash, &record, store_ttl).await;

        tracing::debug!(
            user_id = identity.id,
            family_id = %record.family_id,
            "issued refresh token"
        );
        Ok(raw)
    }

    /// Mints an access token and issues a refresh token in `family_id`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the refresh record cannot be written.
    pub async fn issue_pair(
        &self,
        identity: &Identity,
        family_id: Option<&str>,
    ) -> AuthResult<TokenPair> {
        let access_token = self.codec.mint(identity)?;
        let refresh_token = self.issue(identity, family_id).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.expires_in,
        })
    }

    /// Redeems a refresh token for a new pair in the same family.
    ///
    /// # Errors
    ///
    /// - `Invalid` for a wrong prefix, an unknown or already-redeemed token,
    ///   or a deleted identity
    /// - `Expired` if the record is past its expiry, for as long as the
    ///   record is retained
    /// - `NotActive` if the identity is disabled
    /// - `Revoked` if the identity's token version changed since issuance,
    ///   or the token was removed by [`revoke_all_for_identity`](Self::revoke_all_for_identity)
    /// - `ServiceUnavailable` on store or identity-store failure; the
    ///   presented token stays redeemable in that case
    pub async fn redeem(&self, raw: &str) -> AuthResult<TokenPair> {
        // 1. Reject non-refresh tokens without a lookup
        if !has_refresh_prefix(raw) {
            return Err(AuthError::invalid(TokenKind::Refresh));
        }

        // 2. Take the record; whoever takes it first owns the rotation
        let token_hash = hash_token(raw);
        let record = match self.records.take(&token_hash).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(self.absent(&token_hash).await),
            Err(StorageError::Serialization(e)) => {
                tracing::error!(
                    token = short_hash(&token_hash),
                    error = %e,
                    "discarded unreadable refresh token record"
                );
                return Err(AuthError::invalid(TokenKind::Refresh));
            }
            Err(e) => return Err(unavailable("take refresh token", e)),
        };

        // 3. Expired records go back unindexed, so every later
        //    presentation reports the same
        let now = OffsetDateTime::now_utc();
        if record.is_expired_at(now) {
            self.records.unindex(&token_hash, &record).await;
            self.keep_expired(&token_hash, &record, now).await;
            return Err(AuthError::expired(TokenKind::Refresh));
        }

        // 4. Identity must still exist
        let lookup = bounded(
            "find_by_id",
            self.timeout,
            self.identities.find_by_id(record.user_id),
        )
        .await;
        let identity = match lookup {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::warn!(
                    user_id = record.user_id,
                    family_id = %record.family_id,
                    "refresh token for unknown identity"
                );
                self.destroy_family_quietly(&record.family_id).await;
                return Err(AuthError::invalid(TokenKind::Refresh));
            }
            Err(e) => {
                self.restore(&token_hash, &record, now).await;
                return Err(unavailable("find identity", e));
            }
        };

        // 5. Identity must be active
        if !identity.is_active() {
            self.destroy_family_quietly(&record.family_id).await;
            return Err(AuthError::NotActive);
        }

        // 6. Token version must match
        if identity.token_version != record.token_version {
            tracing::info!(
                user_id = identity.id,
                family_id = %record.family_id,
                record_version = record.token_version,
                current_version = identity.token_version,
                "refresh token version mismatch"
            );
            self.destroy_family_quietly(&record.family_id).await;
            return Err(AuthError::Revoked);
        }

        // 7. The old token is consumed; drop it from the indexes
        self.records.unindex(&token_hash, &record).await;

        // 8. Successor in the same family
        match self.issue_pair(&identity, Some(record.family_id.as_str())).await {
            Ok(pair) => {
                tracing::debug!(
                    user_id = identity.id,
                    family_id = %record.family_id,
                    "rotated refresh token"
                );
                Ok(pair)
            }
            Err(e) => {
                if e.is_transient() {
                    self.restore(&token_hash, &record, now).await;
                }
                Err(e)
            }
        }
    }

    /// Deletes the record for `raw`.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a wrong prefix and `ServiceUnavailable` if the
    /// store cannot be reached. An unknown token is not an error.
    pub async fn revoke(&self, raw: &str) -> AuthResult<()> {
        if !has_refresh_prefix(raw) {
            return Err(AuthError::invalid(TokenKind::Refresh));
        }

        let token_hash = hash_token(raw);
        match self.records.take(&token_hash).await {
            Ok(Some(record)) => {
                self.records.unindex(&token_hash, &record).await;
                tracing::debug!(
                    user_id = record.user_id,
                    family_id = %record.family_id,
                    "revoked refresh token"
                );
                Ok(())
            }
            Ok(None) | Err(StorageError::Serialization(_)) => Ok(()),
            Err(e) => Err(unavailable("revoke refresh token", e)),
        }
    }

    /// Deletes every refresh token owned by `user_id`. Returns how many were live.
    ///
    /// Presenting one of them afterwards reports `Revoked` until its original
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the store cannot be reached.
    pub async fn revoke_all_for_identity(&self, user_id: i64) -> AuthResult<usize> {
        let revoked = self
            .records
            .revoke_user(user_id)
            .await
            .map_err(|e| unavailable("revoke user refresh tokens", e))?;
        tracing::info!(user_id, revoked, "revoked all refresh tokens for identity");
        Ok(revoked)
    }

    /// Deletes every refresh token in `family_id`. Returns how many were live.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the store cannot be reached.
    pub async fn destroy_family(&self, family_id: &str) -> AuthResult<usize> {
        let destroyed = self
            .records
            .destroy_family(family_id)
            .await
            .map_err(|e| unavailable("destroy token family", e))?;
        tracing::warn!(family_id, destroyed, "destroyed refresh token family");
        Ok(destroyed)
    }

    /// Lists the live sessions of `user_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the store cannot be reached.
    pub async fn sessions_for(&self, user_id: i64) -> AuthResult<Vec<SessionInfo>> {
        let records = self
            .records
            .list_user(user_id)
            .await
            .map_err(|e| unavailable("list refresh tokens", e))?;
        Ok(records.iter().map(SessionInfo::from).collect())
    }

    // Classifies a token whose record is gone: bulk-revoked or unknown.
    async fn absent(&self, token_hash: &str) -> AuthError {
        match self.records.revoked(token_hash).await {
            Ok(Some(record)) if record.is_expired_at(OffsetDateTime::now_utc()) => {
                AuthError::expired(TokenKind::Refresh)
            }
            Ok(Some(_)) => {
                tracing::info!(
                    token = short_hash(token_hash),
                    "refresh token presented after revocation"
                );
                AuthError::Revoked
            }
            Ok(None) => {
                tracing::warn!(
                    token = short_hash(token_hash),
                    "refresh token not found; possible reuse of a rotated token"
                );
                AuthError::invalid(TokenKind::Refresh)
            }
            Err(StorageError::Serialization(e)) => {
                tracing::error!(
                    token = short_hash(token_hash),
                    error = %e,
                    "unreadable revocation marker"
                );
                AuthError::Revoked
            }
            Err(e) => unavailable("check refresh token revocation", e),
        }
    }

    async fn destroy_family_quietly(&self, family_id: &str) {
        // The redeemed record is already gone, so a failed cleanup cannot
        // reopen the session it belonged to.
        if let Err(e) = self.destroy_family(family_id).await {
            tracing::warn!(family_id, error = %e, "family cleanup failed");
        }
    }

    async fn keep_expired(
        &self,
        token_hash: &str,
        record: &RefreshTokenRecord,
        now: OffsetDateTime,
    ) {
        let Some(retained) = record.retained_at(now, self.records.retention()) else {
            return;
        };
        if let Err(e) = self.records.save(token_hash, record, retained).await {
            tracing::warn!(
                token = short_hash(token_hash),
                error = %e,
                "failed to keep expired refresh token"
            );
        }
    }

    // Puts back a record taken during a redemption that failed for
    // infrastructure reasons.
    async fn restore(&self, token_hash: &str, record: &RefreshTokenRecord, now: OffsetDateTime) {
        let Some(remaining) = record.retained_at(now, self.records.retention()) else {
            return;
        };
        match self.records.save(token_hash, record, remaining).await {
            Ok(()) => self.records.index(token_hash, record, remaining).await,
            Err(e) => tracing::error!(
                token = short_hash(token_hash),
                error = %e,
                "failed to restore refresh token after transient failure"
            ),
        }
    }
}
