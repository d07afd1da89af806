//! Error taxonomy for encrypted matrix operations.
//!
//! Every failure surfaced by this crate falls into one of four classes:
//! validation (bad operands or requests, rejected before any evaluation),
//! key state (a required session key is absent at the evaluator),
//! deserialization (malformed base64, framing, or a blob incompatible with
//! the active parameter context), and transport (network or HTTP failures
//! on the client side).

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or incompatible input, rejected before any evaluation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required auxiliary key is not present for the session.
    #[error("key not found: {0}")]
    KeyState(String),

    /// A payload could not be decoded against the active parameter context.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Network or HTTP failure while talking to the evaluator.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a key-state error.
    pub fn key_state(msg: impl Into<String>) -> Self {
        Self::KeyState(msg.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::Deserialization(msg.into())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
