//! Error handling module for tuinix
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Discovery fallbacks and best-effort cleanup failures are NOT errors; they are
//! logged where they happen and never reach this type.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for the storage provisioning core
#[derive(Error, Debug)]
pub enum TuinixError {
    /// IO errors (file operations, directory creation)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors (loading, parsing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors (device selection, hostname, host id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage plan or disko layout could not be produced
    #[error("Plan error: {0}")]
    Plan(String),

    /// Something an earlier installer step should have produced is absent
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// An in-process filesystem step failed (mountpoint, layout file)
    #[error("{operation} {}: {source}", .path.display())]
    Fs {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool could not be started at all
    #[error("{operation} {target}: failed to run: {source}")]
    Spawn {
        operation: String,
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran and exited non-zero
    #[error("{operation} {target}: exit code {}: {}", exit_label(.exit_code), .stderr.trim())]
    StepFailed {
        operation: String,
        target: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

/// Result type alias for tuinix operations
pub type Result<T> = std::result::Result<T, TuinixError>;

// Convenient error constructors
impl TuinixError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a plan error
    pub fn plan(msg: impl Into<String>) -> Self {
        Self::Plan(msg.into())
    }

    /// Create a missing prerequisite error
    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingPrerequisite(msg.into())
    }

    /// Wrap an IO error with the operation and path it happened on
    pub fn fs(operation: impl Into<String>, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Fs {
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for errors raised by a tool that changed (or tried to change) disk state.
    pub fn is_step_failure(&self) -> bool {
        matches!(self, Self::StepFailed { .. } | Self::Spawn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TuinixError::config("invalid hostname");
        assert_eq!(err.to_string(), "Configuration error: invalid hostname");

        let err = TuinixError::missing("disko config does not exist: /x/disks.nix");
        assert_eq!(
            err.to_string(),
            "Missing prerequisite: disko config does not exist: /x/disks.nix"
        );
    }

    #[test]
    fn test_step_failed_names_operation_and_target() {
        let err = TuinixError::StepFailed {
            operation: "mkfs.xfs".to_string(),
            target: "/dev/sda2".to_string(),
            exit_code: Some(1),
            stderr: "device busy\n".to_string(),
        };
        assert_eq!(err.to_string(), "mkfs.xfs /dev/sda2: exit code 1: device busy");
        assert!(err.is_step_failure());
    }

    #[test]
    fn test_step_failed_by_signal() {
        let err = TuinixError::StepFailed {
            operation: "disko".to_string(),
            target: "disks.nix".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("exit code signal"));
    }

    #[test]
    fn test_fs_error_names_operation_and_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = TuinixError::fs("mkdir", "/mnt/boot", io_err);
        assert_eq!(err.to_string(), "mkdir /mnt/boot: denied");
        assert!(!err.is_step_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TuinixError = io_err.into();
        assert!(matches!(err, TuinixError::Io(_)));
        assert!(!err.is_step_failure());
    }
}
