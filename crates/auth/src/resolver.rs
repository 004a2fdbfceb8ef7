//! Profile role resolution.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gympal_core::IdentityId;

use crate::{ProfileStore, Role};

#[derive(Debug, Clone)]
struct CachedRole {
    identity_id: IdentityId,
    role: Role,
    ticket: u64,
}

#[derive(Debug, Default)]
struct Cache {
    entry: Option<CachedRole>,
    /// Results from attempts with a ticket at or below this are never cached.
    floor: u64,
}

/// Resolves the role of an authenticated identity from the profile store.
///
/// - A failed lookup or a missing record resolves to [`Role::User`].
/// - One identity is cached at a time; a different identity is a cache miss.
/// - Every lookup takes a ticket from a monotonic counter. A result is cached
///   only if its ticket is newer than the one that last wrote the cache, so
///   concurrent lookups converge on the latest-started attempt.
pub struct RoleResolver {
    profiles: Arc<dyn ProfileStore>,
    tickets: AtomicU64,
    cache: Mutex<Cache>,
}

impl RoleResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            profiles,
            tickets: AtomicU64::new(0),
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Role for `identity_id`, from cache when the same identity is cached.
    pub async fn resolve_role(&self, identity_id: &IdentityId) -> Role {
        if let Some(role) = self.cached(identity_id) {
            return role;
        }
        self.refresh(identity_id).await
    }

    /// Look the role up in the profile store, bypassing the cache.
    pub async fn refresh(&self, identity_id: &IdentityId) -> Role {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;

        let role = match self.profiles.get_profile_role(identity_id).await {
            Ok(Some(record)) => Role::from_tag_lossy(&record.role),
            Ok(None) => {
                tracing::debug!(identity_id = %identity_id, "no profile record; defaulting role");
                Role::default()
            }
            Err(e) => {
                tracing::warn!(identity_id = %identity_id, error = %e, "profile lookup failed; defaulting role");
                Role::default()
            }
        };

        self.store(identity_id, role, ticket)
    }

    /// Forget the cached role (next lookup goes to the store).
    ///
    /// Lookups already in flight when this is called still return their
    /// result to their caller, but never repopulate the cache.
    pub fn invalidate(&self) {
        let issued = self.tickets.load(Ordering::SeqCst);
        if let Ok(mut cache) = self.cache.lock() {
            cache.entry = None;
            cache.floor = issued;
        }
    }

    fn cached(&self, identity_id: &IdentityId) -> Option<Role> {
        let cache = self.cache.lock().ok()?;
        cache
            .entry
            .as_ref()
            .filter(|entry| &entry.identity_id == identity_id)
            .map(|entry| entry.role)
    }

    /// Record a lookup result; returns the role the caller should use.
    fn store(&self, identity_id: &IdentityId, role: Role, ticket: u64) -> Role {
        let Ok(mut cache) = self.cache.lock() else {
            return role;
        };

        if ticket <= cache.floor {
            return role;
        }

        match &cache.entry {
            Some(entry) if entry.ticket > ticket => {
                // A newer attempt already landed. Same identity: converge on it.
                if &entry.identity_id == identity_id {
                    entry.role
                } else {
                    role
                }
            }
            _ => {
                cache.entry = Some(CachedRole {
                    identity_id: identity_id.clone(),
                    role,
                    ticket,
                });
                role
            }
        }
    }
}

impl core::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleResolver")
            .field("tickets", &self.tickets.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
