//! `gympal-events` — in-process change notification (observable) mechanics.
//!
//! Domain-agnostic: the auth layer uses it to push session transitions, but
//! nothing here knows what a session is.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;

pub use bus::{ChangeFeed, Subscription};
pub use envelope::Envelope;
pub use in_memory_bus::{InMemoryChangeFeed, InMemoryFeedError};
