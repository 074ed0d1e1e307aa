//! Credentials, claims and the authorization collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::error::EngineError;

/// Privilege level carried in a verified credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Investor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Investor => f.write_str("investor"),
        }
    }
}

/// Claims of a credential the authorization collaborator has already verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id as issued by the authority
    pub subject: u64,
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
}

impl Claims {
    /// Explicit capability check
    pub fn require_role(&self, required: Role) -> Result<(), EngineError> {
        if self.role == required {
            Ok(())
        } else {
            Err(EngineError::Forbidden { required })
        }
    }
}

/// Bearer token plus its verified claims
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub claims: Claims,
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    pub fn require_role(&self, required: Role) -> Result<(), EngineError> {
        self.claims.require_role(required)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("claims", &self.claims)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Login identity (email or username plus password)
#[derive(Clone)]
pub struct Identity {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Failure reported by the authorization collaborator. A missing response is a failure too.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("credential rejected: {0}")]
    Rejected(String),

    #[error("authorization service unreachable: {0}")]
    Transport(String),

    #[error("authorization call timed out")]
    TimedOut,
}

pub type AuthFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Credential, AuthFailure>> + Send + 'a>>;

/// Authorization collaborator. Each call is single-shot; callers never retry.
pub trait Authorizer: Send + Sync {
    fn login<'a>(&'a self, identity: &'a Identity) -> AuthFuture<'a>;

    fn renew_credential<'a>(&'a self, current: &'a Credential) -> AuthFuture<'a>;
}
