//! Error types for the proxybar supervisor.
//!
//! Failures that happen while `start()` is still in flight are returned as a
//! [`SupervisorError`]. Failures after the call has returned (crashes, forced
//! kills) never show up here; they reach observers through the log buffer and
//! the event stream.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the supervisor library.
#[derive(Debug, Error)]
pub enum SupervisorError {
    // Validation errors
    #[error("Invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u16),

    // Launch errors
    #[error("Could not find {program}. Please install it with: npm install -g {program}")]
    NotInstalled { program: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited during startup ({}): {tail}", exit_code_text(.code))]
    EarlyExit {
        program: String,
        code: Option<i32>,
        /// Most recent log lines, newline-joined.
        tail: String,
    },

    #[error("Server was stopped before startup was confirmed")]
    Cancelled,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

impl From<std::io::Error> for SupervisorError {
    fn from(err: std::io::Error) -> Self {
        SupervisorError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SupervisorError {
    fn from(err: serde_json::Error) -> Self {
        SupervisorError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code".to_string(),
    }
}

impl SupervisorError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        SupervisorError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// The text handed to a start-completion callback.
    ///
    /// An early exit reports the captured log tail alone; everything else
    /// reports its display message.
    pub fn detail(&self) -> String {
        match self {
            SupervisorError::EarlyExit { tail, .. } => tail.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_installed_message() {
        let err = SupervisorError::NotInstalled {
            program: "antigravity-claude-proxy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not find antigravity-claude-proxy. Please install it with: npm install -g antigravity-claude-proxy"
        );
    }

    #[test]
    fn test_early_exit_detail_is_tail() {
        let err = SupervisorError::EarlyExit {
            program: "proxy".to_string(),
            code: Some(1),
            tail: "[12:00:00] boom".to_string(),
        };
        assert_eq!(err.detail(), "[12:00:00] boom");
    }

    #[test]
    fn test_early_exit_message_formats_code() {
        let err = SupervisorError::EarlyExit {
            program: "proxy".to_string(),
            code: Some(3),
            tail: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "proxy exited during startup (code 3): boom");

        let err = SupervisorError::EarlyExit {
            program: "proxy".to_string(),
            code: None,
            tail: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "proxy exited during startup (no exit code): boom"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SupervisorError = io_err.into();
        assert!(matches!(err, SupervisorError::Io { .. }));
    }
}
