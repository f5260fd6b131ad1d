//! Request lifecycle engine: authorization policy, state transitions,
//! creation validation and derived read-only views. Everything in here is
//! pure and testable without a database or transport.

pub mod lifecycle;
pub mod policy;
pub mod validate;
pub mod views;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in lifecycle/policy operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    InvalidTransition(String),
}
