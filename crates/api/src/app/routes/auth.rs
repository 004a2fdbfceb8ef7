use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use gympal_auth::Role;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/sign-in", post(sign_in))
        .route("/sign-up", post(sign_up))
        .route("/sign-out", post(sign_out))
}

pub async fn sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SignInRequest>,
) -> axum::response::Response {
    match services.flow().sign_in(&body.email, &body.password).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(failure) => errors::auth_failure_to_response(failure),
    }
}

pub async fn sign_up(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SignUpRequest>,
) -> axum::response::Response {
    let role = match body.role.as_deref().map(str::parse::<Role>).transpose() {
        Ok(role) => role.unwrap_or_default(),
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_role", e.to_string()),
    };

    match services.flow().sign_up(&body.email, &body.password, role).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(failure) => errors::auth_failure_to_response(failure),
    }
}

/// Always succeeds; backend failures are logged by the flow.
pub async fn sign_out(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let landing = services.flow().sign_out().await;
    (StatusCode::OK, Json(dto::LandingResponse::new(landing))).into_response()
}
