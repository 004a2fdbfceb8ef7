//! Role-aware redirect policy.
//!
//! The single source of truth for "where does this role land". Consumed by the
//! route guard (wrong-role redirect), the sign-in flow and the sign-up flow.

use serde::Serialize;

use crate::Role;

/// An application route path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoutePath(&'static str);

impl RoutePath {
    pub const INDEX: RoutePath = RoutePath("/");
    pub const AUTH: RoutePath = RoutePath("/auth");
    pub const ONBOARDING: RoutePath = RoutePath("/onboarding");
    pub const COACHES: RoutePath = RoutePath("/coaches");
    pub const DASHBOARD: RoutePath = RoutePath("/dashboard");
    pub const COACH_DASHBOARD: RoutePath = RoutePath("/coach/dashboard");
    pub const COACH_SETUP: RoutePath = RoutePath("/coach/setup");
    pub const MODERATOR_DASHBOARD: RoutePath = RoutePath("/moderator/dashboard");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl core::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

/// Steady-state home of a role.
pub fn home_route_for(role: Role) -> RoutePath {
    match role {
        Role::Coach => RoutePath::COACH_DASHBOARD,
        Role::Moderator => RoutePath::MODERATOR_DASHBOARD,
        Role::User | Role::Admin => RoutePath::DASHBOARD,
    }
}

/// Landing route after a successful sign-in.
pub fn landing_after_sign_in(role: Role) -> RoutePath {
    home_route_for(role)
}

/// Landing route after a successful sign-up.
///
/// First-run flows precede the steady-state home: coaches go through the setup
/// wizard, users (and anything defaulting to the user home) through onboarding.
pub fn landing_after_sign_up(role: Role) -> RoutePath {
    match home_route_for(role) {
        RoutePath::COACH_DASHBOARD => RoutePath::COACH_SETUP,
        RoutePath::DASHBOARD => RoutePath::ONBOARDING,
        other => other,
    }
}

/// Landing route after the onboarding questionnaire is submitted.
pub fn landing_after_onboarding() -> RoutePath {
    RoutePath::COACHES
}

/// Landing route after the coach setup wizard completes.
pub fn landing_after_coach_setup() -> RoutePath {
    RoutePath::COACH_DASHBOARD
}

/// Landing route after sign-out.
pub fn landing_after_sign_out() -> RoutePath {
    RoutePath::AUTH
}
