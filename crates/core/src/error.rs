//! Core Error Types
//!
//! Errors raised while launching external processes. Depends only on
//! thiserror + std.

use thiserror::Error;

/// Core error type for the Coverage Panel workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The program could not be launched
    #[error("Command error: {0}")]
    Command(String),

    /// The program does not exist at the given path
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
