//! # Playback Error Types
//!
//! Errors surfaced by players and the sound pool.
//!
//! Lifecycle calls (`release`, channel close) and decodes that finish after
//! every player let go are deliberately not errors; see the crate docs.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The shared-buffer mode cannot provide the requested capability.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// Playback rate outside the configured range.
    #[error("Invalid rate: {rate} (must be between {min} and {max})")]
    InvalidRate { rate: f32, min: f32, max: f32 },

    /// The platform decode/output service rejected a call.
    #[error("Sound pool backend error: {0}")]
    Backend(#[from] BridgeError),

    /// Runtime failure (configuration, event channels, task spawning).
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl PlaybackError {
    /// Returns `true` if the caller asked for something this mode never does.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, PlaybackError::UnsupportedOperation(_))
    }

    /// Returns `true` if the caller passed an out-of-range argument.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidVolume(_) | PlaybackError::InvalidRate { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
