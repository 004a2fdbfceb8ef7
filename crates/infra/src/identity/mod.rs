//! Identity backend and profile store adapters.
//!
//! - [`InMemoryIdentityBackend`] / [`InMemoryProfileStore`]: tests and local dev.
//! - [`SupabaseClient`]: hosted GoTrue auth + PostgREST `profiles` table.
//!
//! Every adapter keeps the current session in process and publishes each
//! transition on its own change feed.

pub mod in_memory;
pub mod supabase;

pub use in_memory::{InMemoryIdentityBackend, InMemoryProfileStore};
pub use supabase::{SupabaseClient, SupabaseError};
