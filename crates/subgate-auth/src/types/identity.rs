//! Identity as seen by the token lifecycle.
//!
//! The relational user record carries much more than this; the session
//! engine only needs enough to mint claims and gate refreshes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role embedded in access tokens.
///
/// Role checks happen above this crate; the value is only carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrator.
    Admin,
    /// Regular account.
    #[default]
    User,
}

impl Role {
    /// Returns the wire name of this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
    #[default]
    Active,
    Disabled,
}

/// An account that can hold sessions.
#[derive(Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Numeric account id.
    pub id: i64,

    /// Email address, used for login and carried in claims for audit.
    pub email: String,

    /// Account role.
    #[serde(default)]
    pub role: Role,

    /// Account status.
    #[serde(default)]
    pub status: IdentityStatus,

    /// Incremented to invalidate every credential issued before the bump.
    #[serde(default)]
    pub token_version: i64,

    /// Argon2 PHC hash. Empty for accounts that only log in externally.
    #[serde(default, skip_serializing)]
    pub password_hash: String,
}

impl Identity {
    /// Creates an active, version-0 identity with the `user` role.
    pub fn new(id: i64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            role: Role::User,
            status: IdentityStatus::Active,
            token_version: 0,
            password_hash: String::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: IdentityStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_token_version(mut self, token_version: i64) -> Self {
        self.token_version = token_version;
        self
    }

    #[must_use]
    pub fn with_password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = password_hash.into();
        self
    }

    /// Returns `true` if the account may hold sessions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("status", &self.status)
            .field("token_version", &self.token_version)
            .finish_non_exhaustive()
    }
}
