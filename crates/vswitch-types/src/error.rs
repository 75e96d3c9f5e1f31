//! Error taxonomy for vswitch operations.
//!
//! All store, codec and engine operations return a typed result consumed by
//! the immediate caller; nothing is silently retried. `InvariantViolation`
//! marks a programming error; callers log it as fatal rather than recover.

use thiserror::Error;

/// Errors surfaced by the vswitch control-plane core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VswitchError {
    /// Object or attribute is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate create for an existing key.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Malformed type, id or attribute.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Id space or configured limit overflow.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Programming error, fatal-and-logged rather than recoverable.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A forwarding-engine call failed; local state is not corrupted.
    #[error("forwarding engine failure: {0}")]
    ExternalFailure(String),
}

impl VswitchError {
    /// Numeric status code for the management channel, negative on failure.
    pub fn status_code(&self) -> i32 {
        match self {
            VswitchError::NotFound(_) => -7,
            VswitchError::AlreadyExists(_) => -6,
            VswitchError::InvalidArgument(_) => -5,
            VswitchError::ResourceExhausted(_) => -4,
            VswitchError::InvariantViolation(_) => -1,
            VswitchError::ExternalFailure(_) => -2,
        }
    }

    /// True for errors a caller may treat as fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VswitchError::InvariantViolation(_))
    }
}

/// Result type used across the vswitch crates.
pub type Result<T> = std::result::Result<T, VswitchError>;
