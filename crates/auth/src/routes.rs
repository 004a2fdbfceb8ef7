//! Route surface and access levels.

use serde::{Deserialize, Serialize};

use crate::{Role, RoutePath};

/// Every route the application exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Index,
    Auth,
    Onboarding,
    Coaches,
    Dashboard,
    CoachDashboard,
    CoachSetup,
    ModeratorDashboard,
    NotFound,
}

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum Access {
    Public,
    Requires(Role),
    /// The catch-all page; reachable by anyone.
    Fallback,
}

impl Route {
    /// All routes with a path, in table order.
    pub const ROUTABLE: [Route; 8] = [
        Route::Index,
        Route::Auth,
        Route::Onboarding,
        Route::Coaches,
        Route::Dashboard,
        Route::CoachDashboard,
        Route::CoachSetup,
        Route::ModeratorDashboard,
    ];

    pub fn path(self) -> Option<RoutePath> {
        match self {
            Route::Index => Some(RoutePath::INDEX),
            Route::Auth => Some(RoutePath::AUTH),
            Route::Onboarding => Some(RoutePath::ONBOARDING),
            Route::Coaches => Some(RoutePath::COACHES),
            Route::Dashboard => Some(RoutePath::DASHBOARD),
            Route::CoachDashboard => Some(RoutePath::COACH_DASHBOARD),
            Route::CoachSetup => Some(RoutePath::COACH_SETUP),
            Route::ModeratorDashboard => Some(RoutePath::MODERATOR_DASHBOARD),
            Route::NotFound => None,
        }
    }

    pub fn access(self) -> Access {
        match self {
            Route::Index | Route::Auth => Access::Public,
            Route::Onboarding | Route::Coaches | Route::Dashboard => Access::Requires(Role::User),
            Route::CoachDashboard | Route::CoachSetup => Access::Requires(Role::Coach),
            Route::ModeratorDashboard => Access::Requires(Role::Moderator),
            Route::NotFound => Access::Fallback,
        }
    }

    pub fn required_role(self) -> Option<Role> {
        match self.access() {
            Access::Requires(role) => Some(role),
            Access::Public | Access::Fallback => None,
        }
    }

    /// Map a request path to a route. Query strings and one trailing slash are ignored.
    pub fn resolve(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path,
        };

        Route::ROUTABLE
            .into_iter()
            .find(|route| route.path().is_some_and(|p| p.as_str() == path))
            .unwrap_or(Route::NotFound)
    }
}

/// Query parameters accepted by `/auth`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthQuery {
    pub signup: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTab {
    #[default]
    SignIn,
    SignUp,
}

/// Initial UI state of the sign-in/sign-up page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthFormState {
    pub tab: AuthTab,
    pub selected_role: Role,
}

impl AuthFormState {
    /// `signup=true` opens the sign-up tab; a valid `role` preselects it (and,
    /// since a role only matters when registering, opens the sign-up tab too).
    /// An unknown role is ignored.
    pub fn from_query(query: &AuthQuery) -> Self {
        let wants_signup = query
            .signup
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let role = query.role.as_deref().and_then(|r| r.parse::<Role>().ok());

        Self {
            tab: if wants_signup || role.is_some() {
                AuthTab::SignUp
            } else {
                AuthTab::SignIn
            },
            selected_role: role.unwrap_or_default(),
        }
    }
}
