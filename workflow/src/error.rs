//! Error types for the beads workflow coordinator.
//!
//! Subprocess failures and malformed tracker output are never errors here:
//! they are folded into values by the client and parser layers. The types in
//! this module cover the remaining failure modes, namely configuration, the
//! bridge transport, and illegal lifecycle transitions.

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::config::ConfigError;

/// Errors that can occur while running the workflow coordinator.
///
/// # Examples
///
/// ```ignore
/// use beads_workflow::error::WorkflowError;
///
/// fn read_event(line: &str) -> Result<serde_json::Value, WorkflowError> {
///     Ok(serde_json::from_str(line)?)
/// }
/// ```
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error on the bridge transport or a memory file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Illegal issue lifecycle transition.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Bridge transport failure.
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Illegal transitions of the active-issue lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A different issue is already claimed for this session.
    #[error("{current} is already claimed; close it before claiming {requested}")]
    AlreadyClaimed { current: String, requested: String },
}

/// A specialized `Result` type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_is_wrapped() {
        let err = WorkflowError::Config(ConfigError::NoHomeDirectory);
        assert_eq!(
            err.to_string(),
            "configuration error: failed to determine home directory"
        );
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err: WorkflowError = io_err.into();
        assert!(matches!(err, WorkflowError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: WorkflowError = json_err.into();
        assert!(matches!(err, WorkflowError::Json(_)));
    }

    #[test]
    fn already_claimed_display() {
        let err = StateError::AlreadyClaimed {
            current: "bd-1".to_string(),
            requested: "bd-2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "bd-1 is already claimed; close it before claiming bd-2"
        );
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WorkflowError = io_err.into();
        assert!(err.source().is_some());
    }

    #[test]
    fn bridge_error_display() {
        let source = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err: WorkflowError = BridgeError::Decode { line: 4, source }.into();
        assert!(err.to_string().starts_with("bridge error: line 4: invalid event"));
    }
}
