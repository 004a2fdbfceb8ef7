use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, MethodRouter},
    Router,
};

use gympal_auth::{Access, Route};

use crate::app::services::AppServices;
use crate::middleware::guard_middleware;

pub mod auth;
pub mod coach;
pub mod onboarding;
pub mod pages;
pub mod system;

/// Pages from the route table plus the JSON endpoints.
///
/// Every page or endpoint that requires a role sits behind its own guard;
/// public ones are mounted bare.
pub fn router(services: &AppServices) -> Router {
    let mut app = Router::new()
        .nest("/api/auth", auth::router())
        .route("/api/navigation", get(system::navigation))
        .merge(guarded(
            services,
            Route::Onboarding.access(),
            Router::new().route("/api/onboarding", post(onboarding::complete)),
        ))
        .merge(guarded(
            services,
            Route::CoachSetup.access(),
            Router::new().route("/api/coach/setup", post(coach::complete_setup)),
        ));

    for route in Route::ROUTABLE {
        let Some(path) = route.path() else {
            continue;
        };
        let handler: MethodRouter = match route {
            Route::Auth => get(pages::auth),
            _ => get(pages::page),
        };
        app = app.merge(guarded(services, route.access(), Router::new().route(path.as_str(), handler)));
    }

    app.fallback(pages::not_found)
}

fn guarded(services: &AppServices, access: Access, routes: Router) -> Router {
    match access {
        Access::Requires(role) => routes.route_layer(from_fn_with_state(services.guard(Some(role)), guard_middleware)),
        Access::Public | Access::Fallback => routes,
    }
}
