//! Error types for reelbox-media.

use std::io;
use thiserror::Error;

/// Result type for reelbox-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for reelbox-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// No video track was found after parsing.
    #[error("no video track")]
    NoVideoTrack,

    /// Unsupported feature or codec.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
