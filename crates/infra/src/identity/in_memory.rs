use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use gympal_auth::{
    AuthError, Credential, IdentityBackend, ProfileError, ProfileRecord, ProfileStore, Role, Session,
    SessionChange, SessionEvent, SignUpAttributes, SignedIn,
};
use gympal_core::{Email, IdentityId};
use gympal_events::{ChangeFeed, InMemoryChangeFeed, Subscription};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    identity_id: IdentityId,
    password: String,
    role: Role,
}

/// In-process identity backend.
///
/// Intended for tests/dev. Holds one client session, like a browser tab would,
/// and confirms sign-ups immediately.
#[derive(Debug)]
pub struct InMemoryIdentityBackend {
    accounts: RwLock<HashMap<Email, Account>>,
    session: RwLock<Session>,
    feed: InMemoryChangeFeed<SessionChange>,
    session_ttl: Duration,
}

impl Default for InMemoryIdentityBackend {
    fn default() -> Self {
        Self::with_session_ttl(Duration::hours(1))
    }
}

impl InMemoryIdentityBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_ttl(session_ttl: Duration) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(Session::Absent),
            feed: InMemoryChangeFeed::new(),
            session_ttl,
        }
    }

    /// Create an account without opening a session.
    pub fn register(&self, email: &Email, password: &str, role: Role) -> Result<IdentityId, AuthError> {
        check_password(password)?;
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        if accounts.contains_key(email) {
            return Err(AuthError::AlreadyRegistered);
        }

        let identity_id = IdentityId::generate();
        accounts.insert(
            email.clone(),
            Account {
                identity_id: identity_id.clone(),
                password: password.to_string(),
                role,
            },
        );
        tracing::debug!(identity_id = %identity_id, "identity registered");
        Ok(identity_id)
    }

    /// Role recorded in the account metadata at sign-up.
    pub fn metadata_role(&self, email: &Email) -> Option<Role> {
        let accounts = self.accounts.read().ok()?;
        accounts.get(email).map(|account| account.role)
    }

    /// Issue a new credential for the signed-in identity.
    pub fn refresh_session(&self) -> Result<Session, AuthError> {
        let mut session = self.session.write().map_err(|_| poisoned())?;
        let Some(identity_id) = session.identity_id().cloned() else {
            return Err(AuthError::InvalidInput("no session to refresh".to_string()));
        };
        *session = Session::present(identity_id, self.issue_credential());
        self.publish(SessionEvent::TokenRefreshed, session.clone());
        Ok(session.clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    fn issue_credential(&self) -> Credential {
        let now = Utc::now();
        Credential::new(
            Uuid::now_v7().simple().to_string(),
            Some(Uuid::now_v7().simple().to_string()),
            now,
            now + self.session_ttl,
        )
    }

    fn open_session(&self, identity_id: &IdentityId) -> Result<Credential, AuthError> {
        let credential = self.issue_credential();
        let mut session = self.session.write().map_err(|_| poisoned())?;
        *session = Session::present(identity_id.clone(), credential.clone());
        // Publish under the lock so feed order matches state order.
        self.publish(SessionEvent::SignedIn, session.clone());
        Ok(credential)
    }

    fn publish(&self, event: SessionEvent, session: Session) {
        if let Err(e) = self.feed.publish(SessionChange::new(event, session)) {
            tracing::error!(error = %e, ?event, "failed to publish session change");
        }
    }
}

#[async_trait]
impl IdentityBackend for InMemoryIdentityBackend {
    async fn sign_in_with_password(&self, email: &Email, password: &str) -> Result<SignedIn, AuthError> {
        let account = {
            let accounts = self.accounts.read().map_err(|_| poisoned())?;
            accounts.get(email).cloned()
        };

        match account {
            Some(account) if account.password == password => {
                let credential = self.open_session(&account.identity_id)?;
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
        attributes: SignUpAttributes,
    ) -> Result<SignedIn, AuthError> {
        let identity_id = self.register(email, password, attributes.role)?;
        let credential = self.open_session(&identity_id)?;
        Ok(SignedIn {
            identity_id,
            credential: Some(credential),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut session = self.session.write().map_err(|_| poisoned())?;
        *session = Session::Absent;
        self.publish(SessionEvent::SignedOut, Session::Absent);
        Ok(())
    }

    async fn get_session(&self) -> Result<Session, AuthError> {
        let session = self.session.read().map_err(|_| poisoned())?;
        Ok(session.clone())
    }

    fn on_session_change(&self) -> Subscription<SessionChange> {
        self.feed.subscribe()
    }
}

#[derive(Debug, Clone)]
struct ProfileRow {
    email: Option<Email>,
    role: String,
}

/// In-process profile table.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    rows: RwLock<HashMap<IdentityId, ProfileRow>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw role tag, bypassing validation (seeding, legacy rows).
    pub fn insert_raw(&self, identity_id: IdentityId, role_tag: impl Into<String>) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(
                identity_id,
                ProfileRow {
                    email: None,
                    role: role_tag.into(),
                },
            );
        }
    }

    pub fn email_of(&self, identity_id: &IdentityId) -> Option<Email> {
        let rows = self.rows.read().ok()?;
        rows.get(identity_id).and_then(|row| row.email.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile_role(&self, identity_id: &IdentityId) -> Result<Option<ProfileRecord>, ProfileError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| ProfileError::Unavailable("lock poisoned".to_string()))?;
        Ok(rows.get(identity_id).map(|row| ProfileRecord { role: row.role.clone() }))
    }

    async fn upsert_profile_role(
        &self,
        identity_id: &IdentityId,
        email: &Email,
        role: Role,
    ) -> Result<(), ProfileError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| ProfileError::Unavailable("lock poisoned".to_string()))?;
        rows.insert(
            identity_id.clone(),
            ProfileRow {
                email: Some(email.clone()),
                role: role.as_str().to_string(),
            },
        );
        Ok(())
    }
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn poisoned() -> AuthError {
    AuthError::Backend {
        status: 500,
        message: "lock poisoned".to_string(),
    }
}
