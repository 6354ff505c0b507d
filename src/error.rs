//! Error types for snapkeep.
//!
//! This module provides a unified error type [`SnapError`] for all snapkeep
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Validation**: missing or malformed operator input
//! - **Schedule**: a schedule matching none of the accepted forms
//! - **Not found**: a job or snapshot that does not exist
//! - **Gateway**: a hypervisor call failed (reported verbatim, never retried)
//! - **Registry corruption**: an unparsable scheduler line, recorded by
//!   [`JobRegistry::list`](crate::jobs::JobRegistry::list) and never raised from it
//!
//! # Example
//!
//! ```rust
//! use snapkeep::error::{Result, SnapError};
//!
//! fn check_namespace(ns: &str) -> Result<()> {
//!     if ns.is_empty() {
//!         return Err(SnapError::Validation("namespace cannot be empty".into()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_namespace("").unwrap_err().is_operator_error());
//! ```

use std::io;
use thiserror::Error;

/// Main error type for snapkeep operations.
#[derive(Error, Debug)]
pub enum SnapError {
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Invalid schedule '{input}': {reason}")]
    ScheduleFormat { input: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Hypervisor call `{command}` failed: {message}")]
    Gateway { command: String, message: String },

    #[error("Unreadable registry line {line_no}: {reason}")]
    RegistryCorruption { line_no: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SnapError {
    /// Build a schedule error naming the offending input.
    pub fn schedule(input: impl Into<String>, reason: impl Into<String>) -> Self {
        SnapError::ScheduleFormat {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Build a gateway error from the command that failed.
    pub fn gateway(command: impl Into<String>, message: impl Into<String>) -> Self {
        SnapError::Gateway {
            command: command.into(),
            message: message.into(),
        }
    }

    /// True when the failure was caused by what the operator asked for rather
    /// than by the host or the hypervisor.
    pub fn is_operator_error(&self) -> bool {
        matches!(
            self,
            SnapError::Validation(_) | SnapError::ScheduleFormat { .. } | SnapError::NotFound(_)
        )
    }
}

impl From<serde_json::Error> for SnapError {
    fn from(e: serde_json::Error) -> Self {
        SnapError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for SnapError {
    fn from(e: toml::de::Error) -> Self {
        SnapError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for SnapError {
    fn from(e: toml::ser::Error) -> Self {
        SnapError::Serialization(e.to_string())
    }
}

/// Result type alias for snapkeep operations.
pub type Result<T> = std::result::Result<T, SnapError>;
