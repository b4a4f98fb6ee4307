//! End-to-end session lifecycle tests over the in-memory stores.
//!
//! Covers the login -> refresh -> logout flow, single-use rotation under
//! concurrency, family revocation and token-version gating.

use std::sync::Arc;
use std::time::Duration;

use subgate_auth::password::hash_password;
use subgate_auth::prelude::*;
use subgate_auth::types::hash_token;
use subgate_auth::{
    AccessTokenCodec, IdentityStatus, MemoryCredentialStore, MemoryIdentityStore, RefreshRecords,
    RefreshTokenIssuer, Validated,
};
use time::OffsetDateTime;

const SECRET: &str = "integration-secret-key-long-enough-for-hs256";
const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "correct horse battery staple";

struct Harness {
    service: Arc<SessionService>,
    store: MemoryCredentialStore,
    identities: MemoryIdentityStore,
}

impl Harness {
    fn new() -> Self {
        let identities = MemoryIdentityStore::new();
        identities.insert(
            Identity::new(1, EMAIL).with_password_hash(hash_password(PASSWORD).unwrap()),
        );
        identities.insert(
            Identity::new(2, "bob@example.com")
                .with_role(Role::Admin)
                .with_password_hash(hash_password("bob-password").unwrap()),
        );

        let store = MemoryCredentialStore::new();
        let service = SessionService::new(
            AuthConfig::with_secret(SECRET),
            Arc::new(store.clone()),
            Arc::new(identities.clone()),
        )
        .unwrap();

        Self {
            service: Arc::new(service),
            store,
            identities,
        }
    }

    // An issuer over the same stores whose tokens live for `lifetime`.
    fn short_lived_issuer(&self, lifetime: Duration) -> RefreshTokenIssuer {
        let config = AuthConfig::with_secret(SECRET);
        RefreshTokenIssuer::new(
            &config,
            Arc::new(AccessTokenCodec::new(&config)),
            Arc::new(self.store.clone()),
            Arc::new(self.identities.clone()),
        )
        .with_lifetime(lifetime)
    }

    async fn login(&self) -> TokenPair {
        let (_, pair) = self
            .service
            .login_with_pair(&Credentials::new(EMAIL, PASSWORD))
            .await
            .unwrap();
        pair
    }

    fn records(&self) -> &RefreshRecords {
        self.service.refresh_tokens().records()
    }

    async fn family_of(&self, refresh_token: &str) -> String {
        self.records()
            .get(&hash_token(refresh_token))
            .await
            .unwrap()
            .expect("refresh record")
            .family_id
    }
}

fn is_invalid_refresh(err: &AuthError) -> bool {
    matches!(
        err,
        AuthError::Invalid {
            kind: TokenKind::Refresh
        }
    )
}

#[tokio::test]
async fn login_refresh_rotates_within_family() {
    let harness = Harness::new();
    let first = harness.login().await;
    let family = harness.family_of(&first.refresh_token).await;

    let second = harness
        .service
        .refresh_pair(&first.refresh_token)
        .await
        .unwrap();
    assert_ne!(second.refresh_token, first.refresh_token);
    assert_eq!(harness.family_of(&second.refresh_token).await, family);

    let (identity, claims) = harness
        .service
        .verify_access(second.access_token.as_str())
        .await
        .unwrap();
    assert_eq!(identity.id, 1);
    assert_eq!(claims.email, EMAIL);

    let err = harness
        .service
        .refresh_pair(&first.refresh_token)
        .await
        .unwrap_err();
    assert!(is_invalid_refresh(&err));

    // The rotated successor is unaffected by the replay.
    assert!(
        harness
            .service
            .refresh_pair(&second.refresh_token)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn concurrent_redemptions_have_one_winner() {
    let harness = Harness::new();
    let pair = harness.login().await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = Arc::clone(&harness.service);
        let token = pair.refresh_token.clone();
        handles.push(tokio::spawn(
            async move { service.refresh_pair(&token).await },
        ));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert!(is_invalid_refresh(&err), "unexpected error: {err:?}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(harness.service.list_sessions(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn password_change_revokes_and_new_login_starts_fresh_family() {
    let harness = Harness::new();
    let old = harness.login().await;
    let old_family = harness.family_of(&old.refresh_token).await;

    let version = harness.service.on_password_changed(1).await.unwrap();
    assert_eq!(version, 1);

    let err = harness
        .service
        .refresh_pair(&old.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));
    assert!(harness.service.list_sessions(1).await.unwrap().is_empty());

    let new = harness.login().await;
    assert_ne!(harness.family_of(&new.refresh_token).await, old_family);
    let pair = harness
        .service
        .refresh_pair(&new.refresh_token)
        .await
        .unwrap();
    let claims = harness
        .service
        .codec()
        .verify(pair.access_token.as_str())
        .unwrap();
    assert_eq!(claims.token_version, 1);
}

#[tokio::test]
async fn version_mismatch_destroys_whole_family() {
    let harness = Harness::new();
    let pair = harness.login().await;
    let family = harness.family_of(&pair.refresh_token).await;

    // A sibling in the same family, as a second device would hold after rotation.
    let identity = Identity::new(1, EMAIL);
    let sibling = harness
        .service
        .refresh_tokens()
        .issue(&identity, Some(family.as_str()))
        .await
        .unwrap();

    // Bump the version behind the service's back so the records survive.
    harness
        .identities
        .update(1, |identity| identity.token_version += 1);

    let err = harness
        .service
        .refresh_pair(&pair.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    let err = harness.service.refresh_pair(&sibling).await.unwrap_err();
    assert!(is_invalid_refresh(&err));
}

#[tokio::test]
async fn disabled_identity_destroys_family_but_not_others() {
    let harness = Harness::new();
    let alice = harness.login().await;
    let alice_other_device = harness.login().await;
    let (_, bob) = harness
        .service
        .login_with_pair(&Credentials::new("bob@example.com", "bob-password"))
        .await
        .unwrap();

    harness
        .identities
        .update(1, |identity| identity.status = IdentityStatus::Disabled);

    let err = harness
        .service
        .refresh_pair(&alice.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotActive));

    // Different family of the same identity: still fails on status.
    let err = harness
        .service
        .refresh_pair(&alice_other_device.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotActive));

    assert!(harness.service.refresh_pair(&bob.refresh_token).await.is_ok());
}

#[tokio::test]
async fn deleted_identity_is_invalid() {
    let harness = Harness::new();
    let pair = harness.login().await;
    harness.identities.remove(1);

    let err = harness
        .service
        .refresh_pair(&pair.refresh_token)
        .await
        .unwrap_err();
    assert!(is_invalid_refresh(&err));
}

#[tokio::test]
async fn logout_all_ends_every_session() {
    let harness = Harness::new();
    let a = harness.login().await;
    let b = harness.login().await;
    assert_eq!(harness.service.list_sessions(1).await.unwrap().len(), 2);

    assert_eq!(harness.service.logout_all(1).await.unwrap(), 2);
    assert!(harness.service.list_sessions(1).await.unwrap().is_empty());

    for token in [&a.refresh_token, &b.refresh_token] {
        let err = harness.service.refresh_pair(token).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }
}

#[tokio::test]
async fn logout_revokes_only_the_presented_token() {
    let harness = Harness::new();
    let a = harness.login().await;
    let b = harness.login().await;

    harness.service.logout(&a.refresh_token).await;

    assert!(harness.service.refresh_pair(&a.refresh_token).await.is_err());
    assert!(harness.service.refresh_pair(&b.refresh_token).await.is_ok());
}

#[tokio::test]
async fn refresh_rejects_access_tokens_and_garbage() {
    let harness = Harness::new();
    let pair = harness.login().await;

    for token in [pair.access_token.as_str(), "", "rt_", "rt_deadbeef"] {
        let err = harness.service.refresh_pair(token).await.unwrap_err();
        assert!(is_invalid_refresh(&err), "{token:?} gave {err:?}");
    }
}

#[tokio::test]
async fn refresh_token_reports_expired_once_its_lifetime_ends() {
    let harness = Harness::new();
    let issuer = harness.short_lived_issuer(Duration::from_millis(300));
    let identity = Identity::new(1, EMAIL);
    let raw = issuer.issue(&identity, None).await.unwrap();
    let rotated = issuer
        .issue_pair(&identity, None)
        .await
        .unwrap()
        .refresh_token;

    tokio::time::sleep(Duration::from_millis(500)).await;

    for token in [&raw, &raw, &rotated] {
        let err = harness.service.refresh_pair(token).await.unwrap_err();
        assert!(
            matches!(
                err,
                AuthError::Expired {
                    kind: TokenKind::Refresh
                }
            ),
            "got {err:?}"
        );
    }
    assert!(harness.service.list_sessions(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn revoked_refresh_token_reports_expired_once_its_lifetime_ends() {
    let harness = Harness::new();
    let issuer = harness.short_lived_issuer(Duration::from_millis(300));
    let raw = issuer.issue(&Identity::new(1, EMAIL), None).await.unwrap();

    harness.service.logout_all(1).await.unwrap();
    let err = harness.service.refresh_pair(&raw).await.unwrap_err();
    assert!(matches!(err, AuthError::Revoked));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let err = harness.service.refresh_pair(&raw).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::Expired {
            kind: TokenKind::Refresh
        }
    ));
}

#[test]
fn access_expiry_is_monotonic() {
    let mut config = AuthConfig::with_secret(SECRET);
    config.jwt.access_token_expire_minutes = 15;
    let codec = subgate_auth::AccessTokenCodec::new(&config);
    let issued_at = OffsetDateTime::now_utc() - time::Duration::hours(1);
    let token = codec
        .mint_at(&Identity::new(1, EMAIL), issued_at)
        .unwrap();

    let exp = issued_at + time::Duration::minutes(15);
    let checks = [
        (exp - time::Duration::seconds(1), false),
        (exp, true),
        (exp + time::Duration::seconds(1), true),
        (exp + time::Duration::days(365), true),
    ];
    for (now, expired) in checks {
        let validated = codec.validate_at(token.as_str(), now).unwrap();
        assert_eq!(validated.is_expired(), expired, "at {now}");
    }
}

#[test]
fn oversized_token_is_rejected_before_parsing() {
    let codec = subgate_auth::AccessTokenCodec::new(&AuthConfig::with_secret(SECRET));
    let huge = "a".repeat(8193);
    assert!(matches!(
        codec.validate(&huge),
        Err(AuthError::TooLarge {
            length: 8193,
            limit: 8192
        })
    ));

    // At the limit it is parsed, and rejected for what it is.
    let at_limit = "a".repeat(8192);
    assert!(matches!(codec.validate(&at_limit), Err(AuthError::Malformed)));
}

#[tokio::test]
async fn legacy_refresh_still_works_when_enabled() {
    let harness = Harness::new();
    let (_, access) = harness
        .service
        .login(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap();

    let refreshed = harness
        .service
        .refresh_access_only(access.as_str())
        .await
        .unwrap();
    let validated = harness
        .service
        .codec()
        .validate(refreshed.as_str())
        .unwrap();
    assert!(matches!(validated, Validated::Valid(_)));
}
