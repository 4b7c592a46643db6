// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types shared by every motion component.

use thiserror::Error;

/// Errors surfaced by the motion components
#[derive(Debug, Error)]
pub enum MotionError {
    /// Navigation target outside `[0, len)`
    #[error("Index {index} out of range for {len} items")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of items in the collection
        len: usize,
    },

    /// Rejected at construction time, never clamped
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// RON parse error
    #[error("Config parse error: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Config serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Config file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MotionError {
    /// Shorthand for an [`MotionError::InvalidConfiguration`]
    pub fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!("Rejected configuration: {message}");
        Self::InvalidConfiguration(message)
    }
}

/// Result type for motion operations
pub type Result<T> = std::result::Result<T, MotionError>;
