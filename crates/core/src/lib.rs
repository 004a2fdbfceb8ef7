//! `gympal-core` — shared primitives for the GymPal workspace.
//!
//! This crate contains **pure** building blocks (no IO, no async).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{Email, IdentityId};
