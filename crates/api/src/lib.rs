//! HTTP app shell: routing, guarded pages and the auth/onboarding endpoints.

pub mod app;
pub mod context;
pub mod middleware;
