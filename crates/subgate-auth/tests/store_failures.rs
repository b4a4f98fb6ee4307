//! Store outages must surface as `ServiceUnavailable` and never burn a
//! refresh token or read as a security failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use subgate_auth::prelude::*;
use subgate_auth::{MemoryCredentialStore, MemoryIdentityStore, StorageError, StorageResult};

const SECRET: &str = "integration-secret-key-long-enough-for-hs256";

/// Memory store with switchable faults.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryCredentialStore,
    fail_take: AtomicBool,
    hang_take: AtomicBool,
    fail_next_puts: AtomicUsize,
}

impl FlakyStore {
    fn consume_put_failure(&self) -> bool {
        self.fail_next_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CredentialStore for FlakyStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        if self.consume_put_failure() {
            return Err(StorageError::unavailable("connection reset"));
        }
        self.inner.put(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn take(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        if self.hang_take.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        if self.fail_take.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("connection refused"));
        }
        self.inner.take(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(key).await
    }

    async fn add_to_set(&self, set_key: &str, member: &str, ttl: Duration) -> StorageResult<()> {
        self.inner.add_to_set(set_key, member, ttl).await
    }

    async fn remove_from_set(&self, set_key: &str, member: &str) -> StorageResult<()> {
        self.inner.remove_from_set(set_key, member).await
    }

    async fn members(&self, set_key: &str) -> StorageResult<Vec<String>> {
        self.inner.members(set_key).await
    }

    async fn delete_set(&self, set_key: &str) -> StorageResult<()> {
        self.inner.delete_set(set_key).await
    }

    async fn ttl_remaining(&self, key: &str) -> StorageResult<Option<Duration>> {
        self.inner.ttl_remaining(key).await
    }
}

/// Identity store that can be switched to failing lookups.
#[derive(Default)]
struct FlakyIdentities {
    inner: MemoryIdentityStore,
    down: AtomicBool,
}

#[async_trait]
impl IdentityStore for FlakyIdentities {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Identity>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("identity database down"));
        }
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Identity>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("identity database down"));
        }
        self.inner.find_by_email(email).await
    }

    async fn increment_token_version(&self, id: i64) -> StorageResult<i64> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("identity database down"));
        }
        self.inner.increment_token_version(id).await
    }
}

struct Harness {
    service: SessionService,
    store: Arc<FlakyStore>,
    identities: Arc<FlakyIdentities>,
}

impl Harness {
    fn new() -> Self {
        let mut config = AuthConfig::with_secret(SECRET);
        config.sessions.store_timeout = Duration::from_millis(100);

        let store = Arc::new(FlakyStore::default());
        let identities = Arc::new(FlakyIdentities::default());
        identities.inner.insert(Identity::new(1, "a@example.com"));

        let service = SessionService::new(
            config,
            Arc::clone(&store) as Arc<dyn CredentialStore>,
            Arc::clone(&identities) as Arc<dyn IdentityStore>,
        )
        .unwrap();

        Self {
            service,
            store,
            identities,
        }
    }

    async fn pair(&self) -> TokenPair {
        self.service
            .start_session(&Identity::new(1, "a@example.com"))
            .await
            .unwrap()
    }
}

fn assert_unavailable(result: AuthResult<TokenPair>) {
    match result {
        Err(err) => {
            assert!(
                matches!(err, AuthError::ServiceUnavailable { .. }),
                "expected ServiceUnavailable, got {err:?}"
            );
            assert!(!err.requires_login());
        }
        Ok(_) => panic!("expected ServiceUnavailable, got a token pair"),
    }
}

#[tokio::test]
async fn store_error_on_take_keeps_token_redeemable() {
    let harness = Harness::new();
    let pair = harness.pair().await;

    harness.store.fail_take.store(true, Ordering::SeqCst);
    assert_unavailable(harness.service.refresh_pair(&pair.refresh_token).await);

    harness.store.fail_take.store(false, Ordering::SeqCst);
    assert!(harness.service.refresh_pair(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn store_timeout_is_unavailable_not_invalid() {
    let harness = Harness::new();
    let pair = harness.pair().await;

    harness.store.hang_take.store(true, Ordering::SeqCst);
    assert_unavailable(harness.service.refresh_pair(&pair.refresh_token).await);

    harness.store.hang_take.store(false, Ordering::SeqCst);
    assert!(harness.service.refresh_pair(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn identity_outage_restores_taken_record() {
    let harness = Harness::new();
    let pair = harness.pair().await;

    harness.identities.down.store(true, Ordering::SeqCst);
    assert_unavailable(harness.service.refresh_pair(&pair.refresh_token).await);

    harness.identities.down.store(false, Ordering::SeqCst);
    let rotated = harness
        .service
        .refresh_pair(&pair.refresh_token)
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, pair.refresh_token);
}

#[tokio::test]
async fn failed_successor_write_restores_taken_record() {
    let harness = Harness::new();
    let pair = harness.pair().await;

    harness.store.fail_next_puts.store(1, Ordering::SeqCst);
    assert_unavailable(harness.service.refresh_pair(&pair.refresh_token).await);

    assert!(harness.service.refresh_pair(&pair.refresh_token).await.is_ok());
}

#[tokio::test]
async fn failed_issue_is_unavailable() {
    let harness = Harness::new();
    harness.store.fail_next_puts.store(1, Ordering::SeqCst);

    let result = harness
        .service
        .start_session(&Identity::new(1, "a@example.com"))
        .await;
    assert_unavailable(result);
    assert!(harness.store.inner.is_empty());
}

#[tokio::test]
async fn login_during_identity_outage_is_unavailable() {
    let harness = Harness::new();
    harness.identities.down.store(true, Ordering::SeqCst);

    let err = harness
        .service
        .login(&Credentials::new("a@example.com", "pw"))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn password_change_fails_if_version_cannot_be_bumped() {
    let harness = Harness::new();
    let pair = harness.pair().await;
    harness.identities.down.store(true, Ordering::SeqCst);

    let err = harness.service.on_password_changed(1).await.unwrap_err();
    assert!(err.is_transient());

    // Nothing was revoked, the session lives on until the retry.
    harness.identities.down.store(false, Ordering::SeqCst);
    assert!(harness.service.refresh_pair(&pair.refresh_token).await.is_ok());
}
