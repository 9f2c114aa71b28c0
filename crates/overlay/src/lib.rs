//! Frame Overlays
//!
//! Renders human-readable drowsiness status onto video frames:
//! - Fixed-position status caption in an alert or normal color
//! - Bounding box around the examined face
//! - Wheel simulation gated by the running/stopped flag

pub mod font;
pub mod wheel;

pub use wheel::{render_wheel, Wheel, WHEEL_STEP_DEGREES};

use camera_capture::{CameraError, VideoFrame};
use dms::{FrameObservation, Region};
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use thiserror::Error;

/// Caption color while an alert is showing (red)
pub const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Caption color otherwise (green)
pub const NORMAL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Top-left corner of the status caption
pub const LABEL_ORIGIN: (i32, i32) = (10, 16);
/// Status caption height, in pixels
pub const LABEL_SCALE: f32 = 24.0;
/// Face box line width
pub const FACE_BOX_THICKNESS: u32 = 2;

/// Overlay error types
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Frame cannot be drawn on: {0}")]
    Frame(#[from] CameraError),

    #[error("Caption font unavailable: {0}")]
    Font(String),
}

/// Status caption drawn onto a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Drowsy,
    Alert,
    EyesClosed,
    EyesOpen,
    NoFace,
}

impl StatusLabel {
    /// Caption reflecting the debounced drowsiness flag
    pub fn for_drowsiness(is_drowsy: bool) -> Self {
        if is_drowsy {
            Self::Drowsy
        } else {
            Self::Alert
        }
    }

    /// Caption reflecting the raw per-frame observation
    pub fn for_observation(observation: FrameObservation) -> Self {
        match observation {
            FrameObservation::EyesClosed => Self::EyesClosed,
            FrameObservation::EyesOpen => Self::EyesOpen,
            FrameObservation::NoFace => Self::NoFace,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Self::Drowsy => "DROWSY DETECTED",
            Self::Alert => "ALERT",
            Self::EyesClosed => "EYES CLOSED",
            Self::EyesOpen => "EYES OPEN",
            Self::NoFace => "NO FACE",
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::Drowsy | Self::EyesClosed)
    }

    pub fn color(&self) -> Rgb<u8> {
        if self.is_alarm() {
            ALERT_COLOR
        } else {
            NORMAL_COLOR
        }
    }
}

/// Draw the status caption and face box onto a copy of `frame`.
///
/// The input frame is left untouched; sequence and timestamp carry over.
pub fn annotate(
    frame: &VideoFrame,
    label: StatusLabel,
    face: Option<&Region>,
) -> Result<VideoFrame, OverlayError> {
    let font = font::caption_font()?;
    let mut canvas = frame.to_rgb_image()?;
    let color = label.color();

    if let Some(face) = face {
        for inset in 0..FACE_BOX_THICKNESS {
            let width = face.width.saturating_sub(2 * inset);
            let height = face.height.saturating_sub(2 * inset);
            if width == 0 || height == 0 {
                break;
            }
            let rect = Rect::at((face.x + inset) as i32, (face.y + inset) as i32)
                .of_size(width, height);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    font::draw_caption(
        &mut canvas,
        &font,
        label.text(),
        LABEL_ORIGIN.0,
        LABEL_ORIGIN.1,
        LABEL_SCALE,
        color,
    );

    Ok(VideoFrame::from_rgb_image(
        canvas,
        frame.timestamp_ns,
        frame.sequence,
    ))
}
