//! `gympal-auth` — session, role and route-authorization core.
//!
//! This crate is decoupled from HTTP and from any particular identity
//! provider: backends plug in through [`IdentityBackend`] and [`ProfileStore`].
//!
//! Components, leaves first:
//! - [`SessionProvider`]: current session + change subscription (fail-closed)
//! - [`RoleResolver`]: profile role lookup, defaulting to [`Role::User`]
//! - [`RouteGuard`]: per-mount authorization state machine
//! - [`redirect`]: the role-aware landing table
//! - [`navigation_for`]: navigation links as a pure function of state
//! - [`AuthContext`] / [`AuthFlow`]: the shared session and the sign-in/up/out flows

pub mod backend;
pub mod context;
pub mod flow;
pub mod guard;
pub mod navigation;
pub mod provider;
pub mod redirect;
pub mod resolver;
pub mod role;
pub mod routes;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{AuthError, IdentityBackend, ProfileError, ProfileRecord, ProfileStore, SignUpAttributes, SignedIn};
pub use context::{AuthContext, PendingSession, SessionWait};
pub use flow::{AuthAction, AuthFailure, AuthFlow, AuthOutcome, InlineMessage};
pub use guard::{Decision, GuardState, MountedGuard, RouteGuard, decide};
pub use navigation::{NavAction, NavLink, NavModel, navigation_for};
pub use provider::{SessionProvider, SessionSubscription, SessionUpdate};
pub use redirect::{RoutePath, home_route_for};
pub use resolver::RoleResolver;
pub use role::{Role, UnknownRole};
pub use routes::{Access, AuthFormState, AuthQuery, AuthTab, Route};
pub use session::{Credential, CredentialError, Session, SessionChange, SessionEvent, validate_credential};
