use axum::{http::StatusCode, response::IntoResponse, Json};

use gympal_auth::redirect::landing_after_coach_setup;

use crate::app::dto;

/// Finish the coach setup wizard. Only reachable by coaches.
pub async fn complete_setup() -> axum::response::Response {
    let landing = dto::LandingResponse::new(landing_after_coach_setup())
        .with_notice("Coach Profile Setup Complete!", "Your coach profile has been created successfully.");
    (StatusCode::OK, Json(landing)).into_response()
}
