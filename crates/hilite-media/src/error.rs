//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during frame synthesis and encoding.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("Encoder failed: {message}")]
    EncoderFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// The encoder's output consumer went away. Expected when a client
    /// disconnects mid-stream; callers stop the frame loop and clean up.
    #[error("Encoder output closed")]
    OutputClosed,

    #[error("Image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error("Encoder timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an encoder failure error.
    pub fn encoder_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::EncoderFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error means the consumer disconnected rather than the
    /// pipeline itself failing.
    pub fn is_output_closed(&self) -> bool {
        matches!(self, Self::OutputClosed)
    }
}
