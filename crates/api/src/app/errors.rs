use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use gympal_auth::{AuthError, AuthFailure};
use gympal_core::DomainError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Sign-in/sign-up failures carry the inline form copy as well.
pub fn auth_failure_to_response(failure: AuthFailure) -> axum::response::Response {
    let (status, code) = match &failure.error {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
        AuthError::AlreadyRegistered => (StatusCode::CONFLICT, "already_registered"),
        AuthError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        AuthError::Network(_) | AuthError::Backend { .. } => (StatusCode::BAD_GATEWAY, "identity_service_error"),
        AuthError::Profile(_) => (StatusCode::BAD_GATEWAY, "profile_error"),
        AuthError::Superseded => (StatusCode::CONFLICT, "session_superseded"),
    };
    let message = failure.inline_message();

    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.description,
            "title": message.title,
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}
