// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playground errors.

use thiserror::Error;

/// Errors that stop a playground run
#[derive(Debug, Error)]
pub enum PlaygroundError {
    /// Engine rejected the configuration
    #[error(transparent)]
    Motion(#[from] motion_sequencer::MotionError),

    /// Script referenced a section that is not mounted
    #[error("Unknown section: {0}")]
    UnknownSection(String),

    /// Runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Frame could not be encoded
    #[error("Frame encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for playground operations
pub type Result<T> = std::result::Result<T, PlaygroundError>;
