//! Service wiring: backend adapters, the shared session and the auth flows.

use std::sync::Arc;

use thiserror::Error;

use gympal_auth::{
    AuthContext, AuthFlow, IdentityBackend, NavModel, ProfileStore, Role, RoleResolver, RouteGuard, Session,
    SessionProvider, navigation_for,
};
use gympal_infra::{BackendConfig, InMemoryIdentityBackend, InMemoryProfileStore, SupabaseClient, SupabaseError};

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to build supabase client: {0}")]
    Supabase(#[from] SupabaseError),
}

/// Everything a handler needs, built once at startup.
pub struct AppServices {
    provider: SessionProvider,
    resolver: Arc<RoleResolver>,
    context: Arc<AuthContext>,
    flow: AuthFlow,
    backend_name: &'static str,
}

impl AppServices {
    /// Wire the services and start the shared session writer.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_parts(
        backend: Arc<dyn IdentityBackend>,
        profiles: Arc<dyn ProfileStore>,
        backend_name: &'static str,
    ) -> Self {
        let provider = SessionProvider::new(backend);
        let resolver = Arc::new(RoleResolver::new(profiles.clone()));
        let context = Arc::new(AuthContext::new(provider.clone(), resolver.clone()));
        context.start();
        let flow = AuthFlow::new(context.clone(), profiles);

        tracing::info!(backend = backend_name, "services wired");
        Self {
            provider,
            resolver,
            context,
            flow,
            backend_name,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_parts(
            Arc::new(InMemoryIdentityBackend::new()),
            Arc::new(InMemoryProfileStore::new()),
            "in-memory",
        )
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn flow(&self) -> &AuthFlow {
        &self.flow
    }

    /// Guard for a group of routes requiring `required_role` (or just a session).
    pub fn guard(&self, required_role: Option<Role>) -> RouteGuard {
        RouteGuard::new(self.provider.clone(), self.resolver.clone(), required_role)
    }

    /// The shared session and, when present, its role.
    pub async fn session_and_role(&self) -> (Session, Option<Role>) {
        let session = self.context.loaded().await;
        let role = match session.identity_id() {
            Some(id) => Some(self.resolver.resolve_role(id).await),
            None => None,
        };
        (session, role)
    }

    pub async fn navigation(&self) -> NavModel {
        let (session, role) = self.session_and_role().await;
        navigation_for(&session, role)
    }

    pub fn shutdown(&self) {
        self.context.shutdown();
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("backend", &self.backend_name)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

pub fn build_services(backend: &BackendConfig) -> Result<AppServices, ServicesError> {
    match backend {
        BackendConfig::InMemory => Ok(AppServices::in_memory()),
        BackendConfig::Supabase(config) => {
            let client = Arc::new(SupabaseClient::new(config)?);
            Ok(AppServices::from_parts(client.clone(), client, backend.name()))
        }
    }
}
