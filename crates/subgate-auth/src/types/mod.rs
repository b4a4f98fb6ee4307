//! Domain types shared by the codec, the rotator and the session service.

pub mod identity;
pub mod refresh_token;
pub mod token_pair;

pub use identity::{Identity, IdentityStatus, Role};
pub use refresh_token::{
    REFRESH_TOKEN_PREFIX, RefreshTokenRecord, SessionInfo, generate_family_id,
    generate_refresh_token, has_refresh_prefix, hash_token,
};
pub use token_pair::{AccessToken, TokenPair};
