//! Token generation, validation, and rotation.
//!
//! This module provides:
//!
//! - [`jwt`] - the access token codec
//! - [`records`] - refresh token records and their index sets in the store
//! - [`refresh`] - refresh token issuance, redemption and revocation

pub mod jwt;
pub mod records;
pub mod refresh;

pub use jwt::{ALLOWED_ALGORITHMS, AccessClaims, AccessTokenCodec, Validated};
pub use records::{RefreshRecords, family_set_key, record_key, revoked_key, user_set_key};
pub use refresh::RefreshTokenIssuer;
