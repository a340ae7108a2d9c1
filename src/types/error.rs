use anyhow::Error;
use thiserror::Error;

/// Application-level error types for azrm-rs.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Cancelled
/// - 1: Everything else (configuration, transport, service, signing)
#[derive(Error, Debug, PartialEq)]
pub enum AzrmError {
    /// Missing or malformed settings. The pipeline never starts.
    #[error("{0}")]
    InvalidConfig(String),

    /// The blob service could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The blob service answered with a non-2xx status.
    #[error("{status}: {reason}")]
    Service { status: u16, reason: String },

    /// Shared Key signature could not be produced.
    #[error("Signing error: {0}")]
    Signing(String),

    /// The shared token was cancelled before the task finished (user
    /// interrupt, or another task's fatal failure).
    #[error("Operation cancelled")]
    Cancelled,
}

impl AzrmError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AzrmError::Cancelled => 0,
            _ => 1,
        }
    }

    /// HTTP status of a service error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AzrmError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<AzrmError>() {
        return *err == AzrmError::Cancelled;
    }
    false
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<AzrmError>() {
        return err.exit_code();
    }
    1
}
