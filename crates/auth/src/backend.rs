//! Collaborator contracts: the identity backend and the profile store.
//!
//! Both are external services. Implementations live in adapter crates
//! (in-memory for dev/tests, hosted REST for production).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gympal_core::{Email, IdentityId};
use gympal_events::Subscription;

use crate::{Credential, Role, Session, SessionChange};

/// Result of a successful sign-in or sign-up.
///
/// `credential` is `None` when the backend accepted a sign-up but did not open
/// a session yet (e.g. it requires email confirmation first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub identity_id: IdentityId,
    pub credential: Option<Credential>,
}

/// Attributes attached to a new identity at sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpAttributes {
    pub role: Role,
}

/// Authentication failure (sign-in/sign-up/sign-out).
///
/// Surfaced to the person at the form; never changes the current session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("user already registered")]
    AlreadyRegistered,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("identity service unreachable: {0}")]
    Network(String),

    #[error("identity service error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("profile update failed: {0}")]
    Profile(#[from] ProfileError),

    /// A later session change replaced the one this flow opened.
    #[error("session changed before sign-in completed")]
    Superseded,
}

/// Profile store failure.
///
/// Lookups recover from this locally (default role); only writes surface it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),

    #[error("profile store rejected the request: {0}")]
    Rejected(String),
}

/// Stored profile row as returned by the store.
///
/// `role` is kept as the raw tag so the resolver decides how to treat
/// unrecognised values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub role: String,
}

/// Remote authentication service.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn sign_in_with_password(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError>;

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        attributes: SignUpAttributes,
    ) -> Result<SignedIn, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn get_session(&self) -> Result<Session, AuthError>;

    /// Subscribe to session transitions (sign-in, sign-out, token refresh).
    ///
    /// Dropping the returned subscription unsubscribes.
    fn on_session_change(&self) -> Subscription<SessionChange>;
}

/// External record store mapping identity to role.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up the profile for `identity_id`; `Ok(None)` means no record.
    async fn get_profile_role(&self, identity_id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileError>;

    /// Create or overwrite the profile role for `identity_id`.
    async fn upsert_profile_role(
        &self,
        identity_id: &IdentityId,
        email: &Email,
        role: Role,
    ) -> Result<(), ProfileError>;
}
