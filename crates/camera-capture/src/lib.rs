//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides frame acquisition behind the [`FrameSource`] trait.
//! Supports:
//! - Image-sequence replay (a directory of recorded frames, 640x480 by default)
//! - Synthetic test-pattern frames for bring-up and tests

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, ImageSequenceSource, SyntheticSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Failed to decode frame {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("End of stream")]
    EndOfStream,
}

/// Kind of frame source backing the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Directory of recorded frames, replayed in file-name order
    #[default]
    ImageSequence,
    /// Generated solid frames
    Synthetic,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device path (directory of frames for image-sequence sources)
    pub device: String,
    /// Source kind
    pub kind: SourceKind,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS (0 disables pacing)
    pub fps: u32,
    /// Restart image sequences from the first frame when exhausted
    pub loop_playback: bool,
    /// Stop after this many frames (synthetic sources only)
    pub frame_limit: Option<u32>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "frames".to_string(),
            kind: SourceKind::ImageSequence,
            width: 640,
            height: 480,
            fps: 30,
            loop_playback: false,
            frame_limit: None,
        }
    }
}

impl CameraConfig {
    /// Synthetic source config, unpaced, for tests and bring-up
    pub fn synthetic(frame_limit: Option<u32>) -> Self {
        Self {
            device: "synthetic".to_string(),
            kind: SourceKind::Synthetic,
            fps: 0,
            frame_limit,
            ..Default::default()
        }
    }

    /// Image-sequence config for a directory of frames
    pub fn image_sequence(dir: impl Into<String>) -> Self {
        Self {
            device: dir.into(),
            kind: SourceKind::ImageSequence,
            ..Default::default()
        }
    }
}
