use serde::{Deserialize, Serialize};

use gympal_auth::{Access, AuthFormState, GuardState, InlineMessage, NavModel, Route, RoutePath};
use gympal_onboarding::OnboardingProfile;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    /// Strictly parsed; defaults to `user` when omitted.
    pub role: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// What a page would render: the route, who may see it and the navigation.
#[derive(Debug, Serialize)]
pub struct PageView {
    pub route: Route,
    pub path: Option<RoutePath>,
    pub access: Access,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<GuardState>,
    pub navigation: NavModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_form: Option<AuthFormState>,
}

impl PageView {
    pub fn new(route: Route, navigation: NavModel) -> Self {
        Self {
            route,
            path: route.path(),
            access: route.access(),
            guard: None,
            navigation,
            auth_form: None,
        }
    }

    pub fn with_guard(mut self, guard: GuardState) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_auth_form(mut self, form: AuthFormState) -> Self {
        self.auth_form = Some(form);
        self
    }
}

/// Where the client should go next, plus the toast copy.
#[derive(Debug, Serialize)]
pub struct LandingResponse {
    pub landing: RoutePath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<InlineMessage>,
}

impl LandingResponse {
    pub fn new(landing: RoutePath) -> Self {
        Self { landing, notice: None }
    }

    pub fn with_notice(mut self, title: &str, description: &str) -> Self {
        self.notice = Some(InlineMessage {
            title: title.to_string(),
            description: description.to_string(),
        });
        self
    }
}

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    #[serde(flatten)]
    pub landing: LandingResponse,
    pub profile: OnboardingProfile,
}
