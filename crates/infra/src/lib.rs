//! Infrastructure layer: configuration and identity/profile backend adapters.

pub mod config;
pub mod identity;

pub use config::{AppConfig, BackendConfig, ConfigError, SupabaseConfig};
pub use identity::{InMemoryIdentityBackend, InMemoryProfileStore, SupabaseClient, SupabaseError};
