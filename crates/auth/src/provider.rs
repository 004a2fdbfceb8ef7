//! Identity session provider.
//!
//! Wraps the identity backend and turns it into two things consumers can rely
//! on: a fail-closed one-shot read, and a subscription that yields every
//! transition with its feed sequence number.

use std::sync::Arc;

use chrono::Utc;

use gympal_events::Subscription;

use crate::{IdentityBackend, Session, SessionChange, SessionEvent};

/// One delivered session transition, already expiry-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub sequence_number: u64,
    pub event: SessionEvent,
    pub session: Session,
}

/// Live subscription to session transitions.
///
/// Delivery order follows the backend's publication order. There is no
/// ordering relative to [`SessionProvider::get_current_session`]: a consumer
/// may see a transition before its initial fetch resolves.
///
/// Dropping the subscription releases it; no update is delivered afterwards.
#[derive(Debug)]
pub struct SessionSubscription {
    inner: Subscription<SessionChange>,
}

impl SessionSubscription {
    /// Wait for the next transition. `None` once the backend's feed is gone.
    pub async fn next(&mut self) -> Option<SessionUpdate> {
        let envelope = self.inner.recv().await?;
        let sequence_number = envelope.sequence_number();
        let SessionChange { event, session } = envelope.into_payload();

        Some(SessionUpdate {
            sequence_number,
            event,
            session: session.checked(Utc::now()),
        })
    }

    pub fn unsubscribe(self) {
        self.inner.unsubscribe();
    }
}

/// Produces the current session and a stream of its changes.
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct SessionProvider {
    backend: Arc<dyn IdentityBackend>,
}

impl SessionProvider {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn IdentityBackend> {
        &self.backend
    }

    /// Query the backend once for the current session.
    ///
    /// Never fails: a backend error or an expired credential reads as
    /// `Session::Absent`.
    pub async fn get_current_session(&self) -> Session {
        match self.backend.get_session().await {
            Ok(session) => session.checked(Utc::now()),
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed; treating as signed out");
                Session::Absent
            }
        }
    }

    /// Subscribe to session transitions.
    ///
    /// Each call opens exactly one backend subscription.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            inner: self.backend.on_session_change(),
        }
    }
}

impl core::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionProvider").finish_non_exhaustive()
    }
}
