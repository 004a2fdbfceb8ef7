use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};

use gympal_auth::{AuthFormState, AuthQuery, Route};

use crate::app::dto::PageView;
use crate::app::services::AppServices;
use crate::context::GuardContext;

/// Any page from the route table. Guarded pages only get here once allowed.
pub async fn page(
    Extension(services): Extension<Arc<AppServices>>,
    guard: Option<Extension<GuardContext>>,
    uri: Uri,
) -> axum::response::Response {
    let route = Route::resolve(uri.path());
    let mut view = PageView::new(route, services.navigation().await);
    if let Some(Extension(guard)) = guard {
        view = view.with_guard(guard.state());
    }
    (StatusCode::OK, Json(view)).into_response()
}

/// `/auth`: `signup=true` opens the sign-up tab, `role=<role>` preselects a role.
pub async fn auth(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<AuthQuery>,
) -> axum::response::Response {
    let form = AuthFormState::from_query(&query);
    let view = PageView::new(Route::Auth, services.navigation().await).with_auth_form(form);
    (StatusCode::OK, Json(view)).into_response()
}

pub async fn not_found(Extension(services): Extension<Arc<AppServices>>, uri: Uri) -> axum::response::Response {
    tracing::warn!(path = %uri.path(), "no route for path");
    let view = PageView::new(Route::NotFound, services.navigation().await);
    (StatusCode::NOT_FOUND, Json(view)).into_response()
}
