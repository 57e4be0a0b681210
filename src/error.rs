//! Custom error types for remedy.
//!
//! Only failures that make further progress impossible are modelled here.
//! Expected outcomes (a failing test run, a fix that does not apply, an empty
//! commit) are plain values in their own modules.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for remedy operations
#[derive(Error, Debug)]
pub enum RemedyError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Repository Errors
    // =========================================================================
    /// Git clone failed
    #[error("Git clone failed: {message}. If this is a private/SSH repo, use an HTTPS repo URL with access permissions.")]
    Clone { message: String },

    /// Git clone exceeded its deadline
    #[error("Git clone timed out after {seconds} seconds. Use an accessible repository URL and verify network/auth access.")]
    CloneTimeout { seconds: u64 },

    /// Workspace could not be prepared
    #[error("Workspace error at {path}: {message}")]
    Workspace { path: PathBuf, message: String },

    /// Git operation failed
    #[error("Git operation failed: {operation} - {message}")]
    Git { operation: String, message: String },

    // =========================================================================
    // Process Errors
    // =========================================================================
    /// External process could not be started
    #[error("Failed to spawn '{program}': {message}")]
    ProcessSpawn { program: String, message: String },

    // =========================================================================
    // Report Errors
    // =========================================================================
    /// Report persistence failed
    #[error("Report error: {message}")]
    Report { message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML error wrapper
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RemedyError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a clone error
    pub fn clone_failed(message: impl Into<String>) -> Self {
        Self::Clone {
            message: message.into(),
        }
    }

    /// Create a git error
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a workspace error
    pub fn workspace(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Workspace {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a report error
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error is worth retrying by an operator.
    ///
    /// Network-bound steps (clone, push) are transient in practice.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CloneTimeout { .. } | Self::Git { .. } | Self::ProcessSpawn { .. }
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Clone { .. } | Self::CloneTimeout { .. } => 3,
            Self::Git { .. } => 4,
            Self::ProcessSpawn { .. } => 6,
            Self::Config { .. } | Self::InvalidConfig { .. } | Self::Toml(_) => 7,
            _ => 1,
        }
    }
}

/// Type alias for remedy results
pub type Result<T> = std::result::Result<T, RemedyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_error_display_mentions_https() {
        let err = RemedyError::clone_failed("repository not found");
        let text = err.to_string();
        assert!(text.contains("repository not found"));
        assert!(text.contains("HTTPS"));
    }

    #[test]
    fn test_clone_timeout_display() {
        let err = RemedyError::CloneTimeout { seconds: 120 };
        assert!(err.to_string().contains("120 seconds"));
    }

    #[test]
    fn test_is_transient() {
        assert!(RemedyError::git("push", "network unreachable").is_transient());
        assert!(RemedyError::CloneTimeout { seconds: 1 }.is_transient());
        assert!(!RemedyError::config("bad").is_transient());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RemedyError::clone_failed("x").exit_code(), 3);
        assert_eq!(RemedyError::git("checkout", "x").exit_code(), 4);
        assert_eq!(RemedyError::invalid_config("loop.max_retry", "zero").exit_code(), 7);
        assert_eq!(RemedyError::report("x").exit_code(), 1);
    }

    #[test]
    fn test_git_error_fields() {
        let err = RemedyError::git("checkout", "branch already exists");
        if let RemedyError::Git { operation, message } = err {
            assert_eq!(operation, "checkout");
            assert_eq!(message, "branch already exists");
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_config_with_path() {
        let path = PathBuf::from("/etc/remedy.toml");
        let err = RemedyError::config_with_path("failed to parse", path.clone());
        if let RemedyError::Config {
            message,
            path: opt_path,
        } = err
        {
            assert_eq!(message, "failed to parse");
            assert_eq!(opt_path, Some(path));
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: RemedyError = io_err.into();
        assert!(matches!(err, RemedyError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
