//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: backend adapters, the shared session and the auth flows
//! - `routes/`: pages from the route table and the JSON endpoints
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use gympal_infra::AppConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::{AppServices, ServicesError};

/// Build the full HTTP router from configuration.
pub fn build_app(config: &AppConfig) -> Result<Router, ServicesError> {
    let services = Arc::new(services::build_services(&config.backend)?);
    Ok(build_router(services))
}

/// Build the router around already-wired services.
pub fn build_router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(&services))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
