use axum::{http::StatusCode, response::IntoResponse, Json};

use gympal_auth::redirect::landing_after_onboarding;
use gympal_onboarding::OnboardingProfile;

use crate::app::{dto, errors};

/// Accept the questionnaire. Only reachable by the `user` tier.
pub async fn complete(Json(body): Json<serde_json::Value>) -> axum::response::Response {
    let profile = match OnboardingProfile::from_json(body) {
        Ok(profile) => profile,
        Err(e) => return errors::domain_error_to_response(e),
    };

    tracing::info!(goals = profile.goals.len(), days_per_week = profile.days_per_week, "onboarding completed");
    let landing = dto::LandingResponse::new(landing_after_onboarding())
        .with_notice("Onboarding Complete!", "Your profile has been set up successfully.");

    (StatusCode::OK, Json(dto::OnboardingResponse { landing, profile })).into_response()
}
