//! Errors raised while validating input.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Something the caller handed in was malformed.
///
/// Backend failures (network, storage) are modelled by the adapter crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation, e.g. a malformed email or an out-of-range age.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
