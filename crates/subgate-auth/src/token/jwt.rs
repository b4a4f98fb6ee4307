//! Access token codec.
//!
//! Access tokens are HMAC-signed JWTs carrying the identity id, email, role
//! and token version. They are self-contained: validation needs the signing
//! secret and a clock, nothing else.
//!
//! # Validation order
//!
//! 1. Size budget, before any parsing
//! 2. Header algorithm against [`ALLOWED_ALGORITHMS`]
//! 3. Signature
//! 4. `nbf`, then `exp`
//!
//! An expired token that passes 1-3 still yields its claims so the legacy
//! refresh path can read the identity id out of it.

use std::fmt;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::{AuthError, TokenKind};
use crate::types::{AccessToken, Identity, Role};

/// Algorithms accepted on validation. Tokens are always minted with HS256.
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

// ============================================================================
// Claims
// ============================================================================

/// Claims embedded in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Identity id.
    pub user_id: i64,
    /// Email at mint time. Audit only.
    pub email: String,
    /// Role at mint time.
    pub role: Role,
    /// Identity token version at mint time.
    pub token_version: i64,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Not before (unix seconds).
    pub nbf: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
}

impl AccessClaims {
    /// Returns `true` if the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }
}

/// Result of a successful signature check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    /// Signature and time window are good.
    Valid(AccessClaims),
    /// Signature is good but the token is past `exp`.
    Expired(AccessClaims),
}

impl Validated {
    #[must_use]
    pub fn claims(&self) -> &AccessClaims {
        match self {
            Self::Valid(claims) | Self::Expired(claims) => claims,
        }
    }

    #[must_use]
    pub fn into_claims(self) -> AccessClaims {
        match self {
            Self::Valid(claims) | Self::Expired(claims) => claims,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired(_))
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Mints and validates access tokens.
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
    max_token_length: usize,
}

impl fmt::Debug for AccessTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenCodec")
            .field("lifetime", &self.lifetime)
            .field("max_token_length", &self.max_token_length)
            .finish_non_exhaustive()
    }
}

impl AccessTokenCodec {
    /// Creates a codec from validated configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt.secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime: config.access_token_lifetime(),
            max_token_length: config.jwt.max_token_length,
        }
    }

    /// Configured access token lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Mints an access token for `identity`, issued now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if signing fails.
    pub fn mint(&self, identity: &Identity) -> AuthResult<AccessToken> {
        self.mint_at(identity, OffsetDateTime::now_utc())
    }

    /// Mints an access token for `identity` as if issued at `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if signing fails.
    pub fn mint_at(
        &self,
        identity: &Identity,
        issued_at: OffsetDateTime,
    ) -> AuthResult<AccessToken> {
        let iat = issued_at.unix_timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let claims = AccessClaims {
            user_id: identity.id,
            email: identity.email.clone(),
            role: identity.role,
            token_version: identity.token_version,
            iat,
            nbf: iat,
            exp: iat.saturating_add(lifetime),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("failed to sign access token: {e}")))?;
        Ok(AccessToken::new(token))
    }

    /// Validates `token` against the current time.
    ///
    /// # Errors
    ///
    /// - `TooLarge` if the token exceeds the size budget
    /// - `Malformed` if it is not a JWT or uses a disallowed algorithm
    /// - `Invalid` if the signature does not match or the token is not yet valid
    pub fn validate(&self, token: &str) -> AuthResult<Validated> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Validates `token` against `now`.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> AuthResult<Validated> {
        if token.len() > self.max_token_length {
            return Err(AuthError::too_large(token.len(), self.max_token_length));
        }

        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            tracing::debug!(alg = ?header.alg, "rejected access token with disallowed algorithm");
            return Err(AuthError::Malformed);
        }

        let mut validation = Validation::new(header.alg);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.validate_exp = false; // checked below so expired claims can be returned
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map_err(classify)?
            .claims;

        if claims.nbf > now.unix_timestamp() {
            return Err(AuthError::invalid(TokenKind::Access));
        }

        if claims.is_expired_at(now) {
            Ok(Validated::Expired(claims))
        } else {
            Ok(Validated::Valid(claims))
        }
    }

    /// Validates `token` and requires it to be unexpired.
    ///
    /// # Errors
    ///
    /// As [`validate`](Self::validate), plus `Expired` for an expired token.
    pub fn verify(&self, token: &str) -> AuthResult<AccessClaims> {
        match self.validate(token)? {
            Validated::Valid(claims) => Ok(claims),
            Validated::Expired(_) => Err(AuthError::expired(TokenKind::Access)),
        }
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::ImmatureSignature => {
            AuthError::invalid(TokenKind::Access)
        }
        ErrorKind::ExpiredSignature => AuthError::expired(TokenKind::Access),
        ErrorKind::InvalidToken
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::MissingAlgorithm
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => AuthError::Malformed,
        _ => AuthError::invalid(TokenKind::Access),
    }
}
