//! Session lifecycle service.
//!
//! The façade used by login, logout, refresh and password-change flows. It
//! composes the access token codec and the refresh token issuer and enforces
//! the token-version rule: bumping an identity's version makes every earlier
//! credential unrefreshable.
//!
//! # Invalidation speeds
//!
//! Access tokens are self-contained, so a version bump does not stop an
//! already-minted access token from validating until its short natural
//! expiry. Refresh tokens are revoked immediately.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::{AuthError, TokenKind, unavailable};
use crate::password::verify_password;
use crate::storage::{CredentialStore, IdentityStore, bounded};
use crate::token::{AccessClaims, AccessTokenCodec, RefreshTokenIssuer};
use crate::types::{AccessToken, Identity, SessionInfo, TokenPair};

/// Email and password presented at login.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Session lifecycle service.
pub struct SessionService {
    codec: Arc<AccessTokenCodec>,
    refresh: RefreshTokenIssuer,
    identities: Arc<dyn IdentityStore>,
    expires_in: u64,
    timeout: Duration,
    legacy_refresh_enabled: bool,
}

impl SessionService {
    /// Creates a session service.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `config` does not validate.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        identities: Arc<dyn IdentityStore>,
    ) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let codec = Arc::new(AccessTokenCodec::new(&config));
        let refresh =
            RefreshTokenIssuer::new(&config, Arc::clone(&codec), store, Arc::clone(&identities));

        Ok(Self {
            codec,
            refresh,
            identities,
            expires_in: config.access_token_expires_in(),
            timeout: config.sessions.store_timeout,
            legacy_refresh_enabled: config.sessions.legacy_refresh_enabled,
        })
    }

    #[must_use]
    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> &RefreshTokenIssuer {
        &self.refresh
    }

    /// Access token lifetime in seconds, for client refresh timers.
    #[must_use]
    pub fn access_token_expires_in(&self) -> u64 {
        self.expires_in
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Logs in and returns a single access token (no refresh token).
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` for an unknown email or wrong password
    /// - `NotActive` for a disabled account
    /// - `ServiceUnavailable` if the identity store fails
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<(Identity, AccessToken)> {
        let identity = self.authenticate(credentials).await?;
        let token = self.codec.mint(&identity)?;
        tracing::info!(user_id = identity.id, "login");
        Ok((identity, token))
    }

    /// Logs in and starts a new refresh token family.
    ///
    /// # Errors
    ///
    /// As [`login`](Self::login), plus `ServiceUnavailable` if the refresh
    /// token cannot be stored.
    pub async fn login_with_pair(
        &self,
        credentials: &Credentials,
    ) -> AuthResult<(Identity, TokenPair)> {
        let identity = self.authenticate(credentials).await?;
        let pair = self.refresh.issue_pair(&identity, None).await?;
        tracing::info!(user_id = identity.id, "login with token pair");
        Ok((identity, pair))
    }

    /// Starts a new refresh token family for an identity authenticated
    /// elsewhere (OAuth, SSO, account linking).
    ///
    /// # Errors
    ///
    /// Returns `NotActive` for a disabled account and `ServiceUnavailable`
    /// if the refresh token cannot be stored.
    pub async fn start_session(&self, identity: &Identity) -> AuthResult<TokenPair> {
        if !identity.is_active() {
            return Err(AuthError::NotActive);
        }
        self.refresh.issue_pair(identity, None).await
    }

    async fn authenticate(&self, credentials: &Credentials) -> AuthResult<Identity> {
        let lookup = bounded(
            "find_by_email",
            self.timeout,
            self.identities.find_by_email(&credentials.email),
        )
        .await
        .map_err(|e| unavailable("find identity by email", e))?;

        let Some(identity) = lookup else {
            tracing::debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let password = credentials.password.clone();
        let hash = identity.password_hash.clone();
        // Argon2 is CPU-bound.
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::internal(format!("password verification task failed: {e}")))?;

        if !matches {
            tracing::debug!(user_id = identity.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !identity.is_active() {
            tracing::info!(user_id = identity.id, "login refused for inactive identity");
            return Err(AuthError::NotActive);
        }

        Ok(identity)
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Exchanges a refresh token for a new pair. See [`RefreshTokenIssuer::redeem`].
    ///
    /// # Errors
    ///
    /// `Invalid`, `Expired`, `NotActive`, `Revoked` or `ServiceUnavailable`.
    pub async fn refresh_pair(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        self.refresh.redeem(refresh_token).await
    }

    /// Exchanges an access token, expired or not, for a new access token.
    ///
    /// Deprecated single-token mode: no rotation and no reuse detection. A
    /// captured access token can be refreshed until the identity's token
    /// version changes. Disabled by `sessions.legacy_refresh_enabled = false`.
    ///
    /// # Errors
    ///
    /// - `LegacyRefreshDisabled` if switched off
    /// - any codec error other than expiry (`TooLarge`, `Malformed`, `Invalid`)
    /// - `Invalid` if the identity no longer exists
    /// - `NotActive` / `Revoked` as for [`refresh_pair`](Self::refresh_pair)
    pub async fn refresh_access_only(&self, access_token: &str) -> AuthResult<AccessToken> {
        if !self.legacy_refresh_enabled {
            return Err(AuthError::LegacyRefreshDisabled);
        }

        let claims = self.codec.validate(access_token)?.into_claims();
        let identity = self.current_identity(&claims).await?;
        self.codec.mint(&identity)
    }

    // ========================================================================
    // Logout and revocation
    // ========================================================================

    /// Revokes one refresh token. Never fails from the caller's perspective.
    pub async fn logout(&self, refresh_token: &str) {
        if let Err(e) = self.refresh.revoke(refresh_token).await {
            tracing::warn!(error = %e, "logout could not revoke refresh token");
        }
    }

    /// Revokes every refresh token of `user_id` ("log out everywhere").
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the store cannot be reached.
    pub async fn logout_all(&self, user_id: i64) -> AuthResult<usize> {
        self.refresh.revoke_all_for_identity(user_id).await
    }

    /// Invalidates every credential of `user_id` after a password change.
    ///
    /// Bumps the token version first, which alone makes every outstanding
    /// refresh token fail with `Revoked`, then deletes the refresh records.
    /// Returns the new token version.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the version bump fails. A failed
    /// record cleanup after a successful bump is logged only.
    pub async fn on_password_changed(&self, user_id: i64) -> AuthResult<i64> {
        let version = bounded(
            "increment_token_version",
            self.timeout,
            self.identities.increment_token_version(user_id),
        )
        .await
        .map_err(|e| unavailable("increment token version", e))?;

        if let Err(e) = self.refresh.revoke_all_for_identity(user_id).await {
            tracing::warn!(
                user_id,
                error = %e,
                "token version bumped but refresh token cleanup failed"
            );
        }

        tracing::info!(user_id, token_version = version, "credentials invalidated");
        Ok(version)
    }

    // ========================================================================
    // Request authentication and introspection
    // ========================================================================

    /// Authenticates a request's access token against the current identity.
    ///
    /// Stricter than [`AccessTokenCodec::verify`]: also rejects tokens of
    /// disabled identities and tokens minted before a version bump.
    ///
    /// # Errors
    ///
    /// Codec errors including `Expired`, then `Invalid`, `NotActive`,
    /// `Revoked` or `ServiceUnavailable`.
    pub async fn verify_access(&self, access_token: &str) -> AuthResult<(Identity, AccessClaims)> {
        let claims = self.codec.verify(access_token)?;
        let identity = self.current_identity(&claims).await?;
        Ok((identity, claims))
    }

    /// Lists the live sessions of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if the store cannot be reached.
    pub async fn list_sessions(&self, user_id: i64) -> AuthResult<Vec<SessionInfo>> {
        self.refresh.sessions_for(user_id).await
    }

    async fn current_identity(&self, claims: &AccessClaims) -> AuthResult<Identity> {
        let identity = bounded(
            "find_by_id",
            self.timeout,
            self.identities.find_by_id(claims.user_id),
        )
        .await
        .map_err(|e| unavailable("find identity", e))?
        .ok_or_else(|| AuthError::invalid(TokenKind::Access))?;

        if !identity.is_active() {
            return Err(AuthError::NotActive);
        }
        if identity.token_version != claims.token_version {
            return Err(AuthError::Revoked);
        }
        Ok(identity)
    }
}
