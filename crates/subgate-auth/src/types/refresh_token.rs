//! Refresh token record and raw-token helpers.
//!
//! # Security
//!
//! - Raw tokens are returned to the client once and never stored
//! - Records are keyed by the SHA-256 hash of the raw token
//! - Tokens descending from one login share a family id

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Prefix every raw refresh token starts with.
///
/// Lets callers reject access tokens and garbage without a store lookup.
pub const REFRESH_TOKEN_PREFIX: &str = "rt_";

/// Random bytes in a raw refresh token (hex encoded after the prefix).
const TOKEN_BYTES: usize = 32;

/// Random bytes in a family id (hex encoded).
const FAMILY_ID_BYTES: usize = 16;

/// Refresh token record held in the credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Owning identity.
    pub user_id: i64,

    /// The identity's token version when this record was issued.
    pub token_version: i64,

    /// Lineage this record belongs to.
    pub family_id: String,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    /// Returns `true` if the record has reached its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Time left until expiry at `now`, or `None` if already expired.
    #[must_use]
    pub fn remaining_at(&self, now: OffsetDateTime) -> Option<std::time::Duration> {
        positive(self.expires_at - now)
    }

    /// How long the record should stay in the store at `now`: until its
    /// expiry plus `retention`. `None` once that point has passed.
    #[must_use]
    pub fn retained_at(
        &self,
        now: OffsetDateTime,
        retention: std::time::Duration,
    ) -> Option<std::time::Duration> {
        let retention = time::Duration::try_from(retention).ok()?;
        let until = self.expires_at.checked_add(retention)?;
        positive(until - now)
    }
}

fn positive(span: time::Duration) -> Option<std::time::Duration> {
    if span.is_positive() {
        span.try_into().ok()
    } else {
        None
    }
}

/// Summary of one live session, for "where am I logged in" listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub family_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl From<&RefreshTokenRecord> for SessionInfo {
    fn from(record: &RefreshTokenRecord) -> Self {
        Self {
            family_id: record.family_id.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

/// Generates a new raw refresh token: `rt_` followed by 64 hex characters.
#[must_use]
pub fn generate_refresh_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().r#gen();
    format!("{REFRESH_TOKEN_PREFIX}{}", hex::encode(bytes))
}

/// Generates a new family id (32 hex characters).
#[must_use]
pub fn generate_family_id() -> String {
    let bytes: [u8; FAMILY_ID_BYTES] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

/// Hashes a raw token for storage lookup (SHA-256, lowercase hex).
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

/// Returns `true` if `token` carries the refresh token prefix.
#[must_use]
pub fn has_refresh_prefix(token: &str) -> bool {
    token.starts_with(REFRESH_TOKEN_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_generate_refresh_token_format() {
        let token = generate_refresh_token();
        assert!(has_refresh_prefix(&token));
        assert_eq!(token.len(), REFRESH_TOKEN_PREFIX.len() + 64);
        assert_ne!(token, generate_refresh_token());
    }

    #[test]
    fn test_family_id_format() {
        let family = generate_family_id();
        assert_eq!(family.len(), 32);
        assert!(family.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_is_stable() {
        let hash = hash_token("rt_abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("rt_abc"));
        assert_ne!(hash, hash_token("rt_abd"));
    }

    #[test]
    fn test_record_expiry() {
        let now = OffsetDateTime::now_utc();
        let record = RefreshTokenRecord {
            user_id: 1,
            token_version: 0,
            family_id: generate_family_id(),
            created_at: now - Duration::days(2),
            expires_at: now + Duration::hours(1),
        };

        assert!(!record.is_expired_at(now));
        assert!(record.is_expired_at(now + Duration::hours(2)));
        assert!(record.remaining_at(now).is_some());
        assert!(record.remaining_at(now + Duration::hours(2)).is_none());
        assert!(record.is_expired_at(record.expires_at));
    }

    #[test]
    fn test_record_retention_outlives_expiry() {
        let now = OffsetDateTime::now_utc();
        let record = RefreshTokenRecord {
            user_id: 1,
            token_version: 0,
            family_id: generate_family_id(),
            created_at: now - Duration::days(2),
            expires_at: now + Duration::hours(1),
        };
        let day = std::time::Duration::from_secs(24 * 3600);

        let retained = record.retained_at(now, day).unwrap();
        assert!(retained > day);
        assert!(retained <= day + std::time::Duration::from_secs(3600));

        let later = now + Duration::hours(2);
        assert!(record.remaining_at(later).is_none());
        assert!(record.retained_at(later, day).is_some());
        assert!(record.retained_at(later, std::time::Duration::ZERO).is_none());
        assert!(record.retained_at(now + Duration::days(2), day).is_none());
    }

    #[test]
    fn test_record_serde() {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap();
        let record = RefreshTokenRecord {
            user_id: 42,
            token_version: 3,
            family_id: "f".repeat(32),
            created_at: now,
            expires_at: now + Duration::days(30),
        };

        let bytes = serde_json::to_vec(&record).unwrap();
        let parsed: RefreshTokenRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, record);
    }
}
