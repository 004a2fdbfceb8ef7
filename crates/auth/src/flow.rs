//! Sign-in, sign-up and sign-out flows.
//!
//! Flows talk to the identity backend and the profile store, then wait for
//! the shared session (owned by [`AuthContext`]) to catch up before reporting
//! where to land. They never write the session themselves.

use std::sync::Arc;

use serde::Serialize;

use gympal_core::{DomainError, Email, IdentityId};

use crate::redirect::{landing_after_sign_in, landing_after_sign_out, landing_after_sign_up};
use crate::{AuthContext, AuthError, PendingSession, ProfileStore, Role, RoutePath, SessionWait, SignUpAttributes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthAction {
    SignIn,
    SignUp,
}

/// A short title/description pair shown next to the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineMessage {
    pub title: String,
    pub description: String,
}

impl InlineMessage {
    fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A failed sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{action:?} failed: {error}")]
pub struct AuthFailure {
    pub action: AuthAction,
    #[source]
    pub error: AuthError,
}

impl AuthFailure {
    pub fn new(action: AuthAction, error: AuthError) -> Self {
        Self { action, error }
    }

    /// The message to show at the form. Retrying is always allowed.
    pub fn inline_message(&self) -> InlineMessage {
        let (title, fallback) = match self.action {
            AuthAction::SignIn => ("Error signing in", "Please check your credentials and try again."),
            AuthAction::SignUp => ("Error signing up", "Please try again with different credentials."),
        };

        let description = match &self.error {
            AuthError::InvalidCredentials => "Invalid login credentials".to_string(),
            AuthError::AlreadyRegistered => "User already registered".to_string(),
            AuthError::InvalidInput(message) => message.clone(),
            AuthError::Backend { message, .. } if !message.trim().is_empty() => message.clone(),
            AuthError::Superseded => "Your session changed while signing in. Please try again.".to_string(),
            AuthError::Backend { .. } | AuthError::Network(_) | AuthError::Profile(_) => fallback.to_string(),
        };

        InlineMessage::new(title, description)
    }
}

/// Where a successful flow lands, and what to tell the person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    pub identity_id: IdentityId,
    pub role: Role,
    pub landing: RoutePath,
    pub notice: InlineMessage,
}

pub struct AuthFlow {
    context: Arc<AuthContext>,
    profiles: Arc<dyn ProfileStore>,
}

impl AuthFlow {
    pub fn new(context: Arc<AuthContext>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { context, profiles }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthFailure> {
        let fail = |error| AuthFailure::new(AuthAction::SignIn, error);
        let email = parse_email(email).map_err(fail)?;
        require_password(password).map_err(fail)?;

        let pending = self.context.pending();
        let signed = self
            .context
            .provider()
            .backend()
            .sign_in_with_password(&email, password)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "sign-in rejected");
                fail(e)
            })?;

        self.settle_session(pending, &signed.identity_id).await.map_err(fail)?;
        let role = self.context.resolver().resolve_role(&signed.identity_id).await;
        let landing = landing_after_sign_in(role);

        tracing::info!(identity_id = %signed.identity_id, role = %role, landing = %landing, "signed in");
        Ok(AuthOutcome {
            identity_id: signed.identity_id,
            role,
            landing,
            notice: InlineMessage::new("Welcome back!", "You have successfully signed in."),
        })
    }

    pub async fn sign_up(&self, email: &str, password: &str, role: Role) -> Result<AuthOutcome, AuthFailure> {
        let fail = |error| AuthFailure::new(AuthAction::SignUp, error);
        let email = parse_email(email).map_err(fail)?;
        require_password(password).map_err(fail)?;

        let pending = self.context.pending();
        let signed = self
            .context
            .provider()
            .backend()
            .sign_up(&email, password, SignUpAttributes { role })
            .await
            .map_err(fail)?;

        self.profiles
            .upsert_profile_role(&signed.identity_id, &email, role)
            .await
            .map_err(|e| {
                tracing::warn!(identity_id = %signed.identity_id, error = %e, "profile upsert failed after sign-up");
                fail(AuthError::Profile(e))
            })?;
        // A lookup racing the upsert may have cached the default role.
        self.context.resolver().invalidate();

        if signed.credential.is_some() {
            self.settle_session(pending, &signed.identity_id).await.map_err(fail)?;
        }
        let landing = landing_after_sign_up(role);

        tracing::info!(identity_id = %signed.identity_id, role = %role, landing = %landing, "signed up");
        Ok(AuthOutcome {
            identity_id: signed.identity_id,
            role,
            landing,
            notice: InlineMessage::new("Registration successful!", "Your account has been created."),
        })
    }

    /// Wait for the shared session to catch up with the backend call.
    async fn settle_session(&self, pending: PendingSession, identity_id: &IdentityId) -> Result<(), AuthError> {
        match self.context.wait_for_identity(pending, identity_id).await {
            SessionWait::Reached(_) | SessionWait::Unavailable => Ok(()),
            SessionWait::Superseded(session) => {
                tracing::warn!(
                    identity_id = %identity_id,
                    present = session.is_present(),
                    "session replaced before the flow completed"
                );
                Err(AuthError::Superseded)
            }
        }
    }

    /// Sign out. Failures are logged and otherwise ignored.
    pub async fn sign_out(&self) -> RoutePath {
        if let Err(e) = self.context.provider().backend().sign_out().await {
            tracing::warn!(error = %e, "sign-out failed; continuing");
        }
        landing_after_sign_out()
    }
}

impl core::fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthFlow").field("context", &self.context).finish_non_exhaustive()
    }
}

fn parse_email(raw: &str) -> Result<Email, AuthError> {
    Email::parse(raw).map_err(|e| match e {
        DomainError::Validation(message) => AuthError::InvalidInput(message),
        other => AuthError::InvalidInput(other.to_string()),
    })
}

fn require_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password is required".to_string()));
    }
    Ok(())
}
