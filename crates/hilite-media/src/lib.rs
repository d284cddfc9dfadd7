#![deny(unreachable_patterns)]
//! Frame synthesis and video encoding for highlight exports.
//!
//! This crate provides:
//! - Base-canvas construction (decode, resolution cap, even-dimension
//!   padding, watermark bake)
//! - Per-frame compositing with a multiply-blend highlight rectangle
//! - A single-flight watermark asset cache
//! - A pipe-streaming FFmpeg encoder session (PNG frames in on stdin,
//!   MP4 bytes out on stdout)

pub mod compositor;
pub mod encoder;
pub mod error;
pub mod watermark;

pub use compositor::BaseCanvas;
pub use encoder::{EncoderCommand, EncoderSession};
pub use error::{MediaError, MediaResult};
pub use watermark::{WatermarkCache, WatermarkPlacement};
