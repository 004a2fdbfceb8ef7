//! Test doubles for the backend contracts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Notify;

use gympal_core::{Email, IdentityId};
use gympal_events::{ChangeFeed, InMemoryChangeFeed, Subscription};

use crate::{
    AuthError, Credential, IdentityBackend, ProfileError, ProfileRecord, ProfileStore, Role, Session,
    SessionChange, SessionEvent, SignUpAttributes, SignedIn,
};

pub(crate) fn identity(id: &str) -> IdentityId {
    IdentityId::new(id).unwrap()
}

pub(crate) fn fresh_credential() -> Credential {
    let now = Utc::now();
    Credential::new("access", Some("refresh".to_string()), now, now + Duration::hours(1))
}

/// A latch that parks callers until released.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    identity_id: IdentityId,
}

#[derive(Default)]
pub(crate) struct FakeIdentityBackend {
    session: Mutex<Session>,
    feed: InMemoryChangeFeed<SessionChange>,
    accounts: Mutex<HashMap<String, Account>>,
    fail_lookups: AtomicBool,
    fail_sign_out: AtomicBool,
    sign_out_behind_sign_in: AtomicBool,
    session_gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeIdentityBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_session(&self, session: Session) {
        *self.session.lock().unwrap() = session;
    }

    /// Change the session and notify subscribers, as the backend would.
    pub(crate) fn push(&self, event: SessionEvent, session: Session) {
        self.set_session(session.clone());
        self.feed.publish(SessionChange::new(event, session)).unwrap();
    }

    pub(crate) fn fail_session_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Publish a `SignedOut` right behind every `SignedIn`, as a concurrent
    /// sign-out would.
    pub(crate) fn sign_out_behind_sign_in(&self, on: bool) {
        self.sign_out_behind_sign_in.store(on, Ordering::SeqCst);
    }

    /// Park every `get_session` call until the returned gate is released.
    pub(crate) fn gate_session_lookups(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.session_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn register(&self, email: &str, password: &str) -> IdentityId {
        let identity_id = IdentityId::generate();
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity_id: identity_id.clone(),
            },
        );
        identity_id
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    fn open_session(&self, identity_id: &IdentityId) -> Credential {
        let credential = fresh_credential();
        self.push(
            SessionEvent::SignedIn,
            Session::present(identity_id.clone(), credential.clone()),
        );
        if self.sign_out_behind_sign_in.load(Ordering::SeqCst) {
            self.push(SessionEvent::SignedOut, Session::Absent);
        }
        credential
    }
}

#[async_trait]
impl IdentityBackend for FakeIdentityBackend {
    async fn sign_in_with_password(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError> {
        let account = self.accounts.lock().unwrap().get(email.as_str()).cloned();
        match account {
            Some(account) if account.password == password => {
                let credential = self.open_session(&account.identity_id);
                Ok(SignedIn {
                    identity_id: account.identity_id,
                    credential: Some(credential),
                })
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        _attributes: SignUpAttributes,
    ) -> Result<SignedIn, AuthError> {
        if self.accounts.lock().unwrap().contains_key(email.as_str()) {
            return Err(AuthError::AlreadyRegistered);
        }
        let identity_id = self.register(email.as_str(), password);
        let credential = self.open_session(&identity_id);
        Ok(SignedIn {
            identity_id,
            credential: Some(credential),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection reset".to_string()));
        }
        self.push(SessionEvent::SignedOut, Session::Absent);
        Ok(())
    }

    async fn get_session(&self) -> Result<Session, AuthError> {
        let gate = self.session_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(AuthError::Network("connection refused".to_string()));
        }
        Ok(self.session.lock().unwrap().clone())
    }

    fn on_session_change(&self) -> Subscription<SessionChange> {
        self.feed.subscribe()
    }
}

#[derive(Default)]
pub(crate) struct FakeProfileStore {
    roles: Mutex<HashMap<IdentityId, String>>,
    gates: Mutex<HashMap<IdentityId, Arc<Gate>>>,
    lookups: AtomicUsize,
    lookup_made: Notify,
    fail_lookups: AtomicBool,
    fail_upserts: AtomicBool,
}

impl FakeProfileStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_role(&self, identity_id: &IdentityId, role: &str) {
        self.roles
            .lock()
            .unwrap()
            .insert(identity_id.clone(), role.to_string());
    }

    pub(crate) fn role_of(&self, identity_id: &IdentityId) -> Option<String> {
        self.roles.lock().unwrap().get(identity_id).cloned()
    }

    pub(crate) fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Park lookups for `identity_id` (after they read the record) until released.
    pub(crate) fn gate(&self, identity_id: &IdentityId) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(identity_id.clone(), gate.clone());
        gate
    }

    /// Stop parking new lookups for `identity_id`.
    pub(crate) fn ungate(&self, identity_id: &IdentityId) {
        self.gates.lock().unwrap().remove(identity_id);
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_lookups(&self, count: usize) {
        loop {
            let notified = self.lookup_made.notified();
            if self.lookups() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn get_profile_role(&self, identity_id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileError> {
        let snapshot = self.roles.lock().unwrap().get(identity_id).cloned();
        let gate = self.gates.lock().unwrap().get(identity_id).cloned();

        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup_made.notify_waiters();

        if let Some(gate) = gate {
            gate.wait().await;
        }
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(ProfileError::Unavailable("timeout".to_string()));
        }
        Ok(snapshot.map(|role| ProfileRecord { role }))
    }

    async fn upsert_profile_role(
        &self,
        identity_id: &IdentityId,
        _email: &Email,
        role: Role,
    ) -> Result<(), ProfileError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(ProfileError::Rejected("row level security".to_string()));
        }
        self.set_role(identity_id, role.as_str());
        Ok(())
    }
}
