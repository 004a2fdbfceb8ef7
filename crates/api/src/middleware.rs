use axum::{
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use gympal_auth::{Decision, RouteGuard, RoutePath, home_route_for};

use crate::app::errors::json_error;
use crate::context::GuardContext;

/// Gate a group of routes behind a [`RouteGuard`].
///
/// Each request mounts the guard, waits for it to settle and then either runs
/// the handler or answers with a `303 See Other` to the policy target. The
/// mounted guard is dropped with the request, releasing its subscription.
pub async fn guard_middleware(
    State(guard): State<RouteGuard>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let mut mounted = guard.mount();
    let state = mounted.settled().await;
    let decision = state.decision();

    tracing::debug!(path = %req.uri().path(), ?state, ?decision, "guard settled");

    match decision {
        Decision::Allow => {
            req.extensions_mut().insert(GuardContext::new(state));
            next.run(req).await
        }
        Decision::RedirectToLogin => Redirect::to(RoutePath::AUTH.as_str()).into_response(),
        Decision::RedirectToRoleHome(role) => Redirect::to(home_route_for(role).as_str()).into_response(),
        Decision::Pending => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "session_unavailable",
            "session state is not available",
        ),
    }
}
