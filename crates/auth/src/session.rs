use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gympal_core::IdentityId;

/// Tolerated clock difference between this process and the identity backend.
const CLOCK_SKEW_SECS: i64 = 30;

/// Credential issued by the identity backend (transport-agnostic).
///
/// The core never looks inside the tokens; it only checks the validity window
/// and hands the credential back to the backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            issued_at,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential has expired")]
    Expired,

    #[error("credential not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid credential time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate a credential's time window.
///
/// Signature verification stays with the backend that issued it.
pub fn validate_credential(credential: &Credential, now: DateTime<Utc>) -> Result<(), CredentialError> {
    if credential.expires_at <= credential.issued_at {
        return Err(CredentialError::InvalidTimeWindow);
    }
    if now + Duration::seconds(CLOCK_SKEW_SECS) < credential.issued_at {
        return Err(CredentialError::NotYetValid);
    }
    if now >= credential.expires_at {
        return Err(CredentialError::Expired);
    }
    Ok(())
}

/// Current authentication state of the application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Absent,
    Present {
        identity_id: IdentityId,
        credential: Credential,
    },
}

impl Session {
    pub fn present(identity_id: IdentityId, credential: Credential) -> Self {
        Session::Present { identity_id, credential }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Session::Present { .. })
    }

    pub fn identity_id(&self) -> Option<&IdentityId> {
        match self {
            Session::Present { identity_id, .. } => Some(identity_id),
            Session::Absent => None,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Session::Present { credential, .. } => Some(credential),
            Session::Absent => None,
        }
    }

    /// Collapse to `Absent` if the credential is outside its validity window.
    pub fn checked(self, now: DateTime<Utc>) -> Session {
        let verdict = match &self {
            Session::Present { credential, .. } => validate_credential(credential, now),
            Session::Absent => Ok(()),
        };

        match verdict {
            Ok(()) => self,
            Err(e) => {
                tracing::debug!(identity_id = ?self.identity_id(), error = %e, "dropping invalid session");
                Session::Absent
            }
        }
    }
}

/// Kind of transition reported by the identity backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A session transition pushed by the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Session,
}

impl SessionChange {
    pub fn new(event: SessionEvent, session: Session) -> Self {
        Self { event, session }
    }
}
