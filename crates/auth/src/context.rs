//! Process-wide shared session.
//!
//! [`AuthContext`] owns the only writer of the shared [`Session`]: a task fed
//! by the [`SessionProvider`]. Flows and request handlers only read it.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use gympal_core::IdentityId;

use crate::provider::SessionSubscription;
use crate::{RoleResolver, Session, SessionEvent, SessionProvider};

/// The shared session and the last feed sequence number written into it.
#[derive(Debug, Clone, Default)]
struct Shared {
    session: Option<Session>,
    applied: u64,
}

/// A transition the caller is about to cause on the session feed.
///
/// Open it with [`AuthContext::pending`] before calling the backend, so the
/// resulting transition is delivered to it.
#[derive(Debug)]
pub struct PendingSession {
    changes: SessionSubscription,
}

/// How waiting on a [`PendingSession`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionWait {
    /// The shared session belongs to the identity.
    Reached(Session),
    /// The transition landed, but a newer one already replaced it.
    Superseded(Session),
    /// Nothing to wait on: the context is stopped or the feed closed.
    Unavailable,
}

/// Shared session state with explicit start/shutdown.
///
/// Before the first value lands the context is "loading" and
/// [`AuthContext::current`] returns `None`.
pub struct AuthContext {
    provider: SessionProvider,
    resolver: Arc<RoleResolver>,
    state: Arc<watch::Sender<Shared>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl AuthContext {
    pub fn new(provider: SessionProvider, resolver: Arc<RoleResolver>) -> Self {
        let (state, _) = watch::channel(Shared::default());
        Self {
            provider,
            resolver,
            state: Arc::new(state),
            writer: Mutex::new(None),
        }
    }

    pub fn provider(&self) -> &SessionProvider {
        &self.provider
    }

    pub fn resolver(&self) -> &Arc<RoleResolver> {
        &self.resolver
    }

    /// Spawn the writer task. Calling it again while running is a no-op.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(&self) {
        let Ok(mut writer) = self.writer.lock() else {
            tracing::error!("auth context lock poisoned; not starting");
            return;
        };
        if writer.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let changes = self.provider.subscribe();
        let task = tokio::spawn(write_session(
            self.provider.clone(),
            self.resolver.clone(),
            self.state.clone(),
            changes,
        ));
        *writer = Some(task);
        tracing::info!("auth context started");
    }

    /// Stop the writer task and release its subscription.
    ///
    /// The last observed session stays readable.
    pub fn shutdown(&self) {
        let task = match self.writer.lock() {
            Ok(mut writer) => writer.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            task.abort();
            tracing::info!("auth context stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.writer
            .lock()
            .map(|writer| writer.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// The latest session, or `None` while still loading.
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    /// Wait for the first session value. Returns `Absent` if not running.
    pub async fn loaded(&self) -> Session {
        if !self.is_running() {
            return self.current().unwrap_or_default();
        }
        let mut rx = self.state.subscribe();
        match rx.wait_for(|shared| shared.session.is_some()).await {
            Ok(shared) => shared.session.clone().unwrap_or_default(),
            Err(_) => Session::Absent,
        }
    }

    /// Start watching for a transition the caller is about to trigger.
    pub fn pending(&self) -> PendingSession {
        PendingSession {
            changes: self.provider.subscribe(),
        }
    }

    /// Wait until the shared session reflects the first transition to
    /// `identity_id` seen by `pending`, then report whether it still holds.
    ///
    /// Any later transition that lands first wins, so this never waits past
    /// the newest change. Returns `Unavailable` at once when the context is
    /// not running.
    pub async fn wait_for_identity(&self, pending: PendingSession, identity_id: &IdentityId) -> SessionWait {
        if !self.is_running() {
            tracing::debug!(identity_id = %identity_id, "auth context not running; not waiting for session");
            return SessionWait::Unavailable;
        }

        let mut changes = pending.changes;
        let target = loop {
            match changes.next().await {
                Some(update) if update.session.identity_id() == Some(identity_id) => break update.sequence_number,
                Some(_) => continue,
                None => return SessionWait::Unavailable,
            }
        };
        changes.unsubscribe();

        let mut rx = self.state.subscribe();
        let Ok(shared) = rx.wait_for(|shared| shared.applied >= target).await else {
            return SessionWait::Unavailable;
        };
        let session = shared.session.clone().unwrap_or_default();
        if session.identity_id() == Some(identity_id) {
            SessionWait::Reached(session)
        } else {
            tracing::debug!(
                identity_id = %identity_id,
                sequence = target,
                applied = shared.applied,
                "session superseded before the flow observed it"
            );
            SessionWait::Superseded(session)
        }
    }
}

impl core::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let shared = self.state.borrow();
        f.debug_struct("AuthContext")
            .field("running", &self.is_running())
            .field("loaded", &shared.session.is_some())
            .field("applied", &shared.applied)
            .finish_non_exhaustive()
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn write_session(
    provider: SessionProvider,
    resolver: Arc<RoleResolver>,
    state: Arc<watch::Sender<Shared>>,
    mut changes: SessionSubscription,
) {
    let initial = provider.get_current_session();
    tokio::pin!(initial);
    let mut initial_pending = true;

    loop {
        tokio::select! {
            session = &mut initial, if initial_pending => {
                initial_pending = false;
                tracing::debug!(present = session.is_present(), "initial session loaded");
                state.send_modify(|shared| shared.session = Some(session));
            }
            update = changes.next() => {
                let Some(update) = update else {
                    tracing::debug!("session feed closed; auth context stops updating");
                    break;
                };
                // A pushed transition supersedes the initial fetch.
                initial_pending = false;

                if matches!(update.event, SessionEvent::SignedIn | SessionEvent::SignedOut) {
                    resolver.invalidate();
                }
                tracing::debug!(
                    sequence = update.sequence_number,
                    event = ?update.event,
                    present = update.session.is_present(),
                    "shared session updated"
                );
                state.send_modify(|shared| {
                    shared.session = Some(update.session);
                    shared.applied = update.sequence_number;
                });
            }
        }
    }
}
