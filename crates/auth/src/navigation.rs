//! Navigation links as a pure function of session and role.

use serde::Serialize;

use crate::{Role, RoutePath, Session, home_route_for};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub label: &'static str,
    pub href: String,
}

impl NavLink {
    fn new(label: &'static str, href: impl Into<String>) -> Self {
        Self {
            label,
            href: href.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavAction {
    SignOut,
}

impl NavAction {
    pub fn label(&self) -> &'static str {
        match self {
            NavAction::SignOut => "Log Out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavModel {
    pub signed_in: bool,
    /// Where "home" points for this visitor.
    pub home: RoutePath,
    pub links: Vec<NavLink>,
    pub actions: Vec<NavAction>,
}

/// The navigation for `session`, with `role` the resolved role if any.
///
/// A present session without a resolved role links to the `user` home.
pub fn navigation_for(session: &Session, role: Option<Role>) -> NavModel {
    let mut links = vec![
        NavLink::new("Home", RoutePath::INDEX.as_str()),
        NavLink::new("Find Coaches", RoutePath::COACHES.as_str()),
    ];

    if !session.is_present() {
        links.push(NavLink::new("Sign In", RoutePath::AUTH.as_str()));
        links.push(NavLink::new("Sign Up", format!("{}?signup=true", RoutePath::AUTH)));
        return NavModel {
            signed_in: false,
            home: RoutePath::INDEX,
            links,
            actions: Vec::new(),
        };
    }

    let home = home_route_for(role.unwrap_or_default());
    links.push(NavLink::new("Dashboard", home.as_str()));

    NavModel {
        signed_in: true,
        home,
        links,
        actions: vec![NavAction::SignOut],
    }
}
