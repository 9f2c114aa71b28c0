//! Per-frame eye-state classification
//!
//! Face and eye localisation are external detectors plugged in through
//! [`RegionDetector`]. [`CascadeClassifier`] applies the decision policy on
//! top of them: no face means `NoFace`, otherwise only the first face is
//! examined and fewer than two eyes inside it means `EyesClosed`.
//!
//! This crate ships no detector implementation. Callers provide face and eye
//! detectors from outside; without them the monitor falls back to
//! [`ManifestClassifier`](crate::ManifestClassifier) replay.

use camera_capture::VideoFrame;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DmsError;

/// Eyes that must be visible in the face region for `EyesOpen`
pub const MIN_VISIBLE_EYES: usize = 2;

/// Outcome of classifying a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameObservation {
    NoFace,
    EyesOpen,
    EyesClosed,
}

impl FrameObservation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFace => "no_face",
            Self::EyesOpen => "eyes_open",
            Self::EyesClosed => "eyes_closed",
        }
    }
}

/// Axis-aligned detection rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Classifier output: the observation plus the face it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub observation: FrameObservation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<Region>,
}

impl Classification {
    pub fn no_face() -> Self {
        Self {
            observation: FrameObservation::NoFace,
            face: None,
        }
    }
}

/// Locates objects (faces, eyes) in a grayscale image.
///
/// Results are returned in detector order; callers that need a single
/// region take the first one.
pub trait RegionDetector: Send {
    fn detect(&mut self, image: &GrayImage) -> Result<Vec<Region>, DmsError>;
}

/// Produces one [`Classification`] per frame
pub trait FrameClassifier: Send {
    fn classify(&mut self, frame: &VideoFrame) -> Result<Classification, DmsError>;
}

impl<C: FrameClassifier + ?Sized> FrameClassifier for Box<C> {
    fn classify(&mut self, frame: &VideoFrame) -> Result<Classification, DmsError> {
        (**self).classify(frame)
    }
}

/// Face-then-eyes classification over two region detectors
pub struct CascadeClassifier<F, E> {
    face_detector: F,
    eye_detector: E,
}

impl<F: RegionDetector, E: RegionDetector> CascadeClassifier<F, E> {
    pub fn new(face_detector: F, eye_detector: E) -> Self {
        Self {
            face_detector,
            eye_detector,
        }
    }
}

impl<F: RegionDetector, E: RegionDetector> FrameClassifier for CascadeClassifier<F, E> {
    fn classify(&mut self, frame: &VideoFrame) -> Result<Classification, DmsError> {
        let gray = frame
            .to_gray_image()
            .map_err(|e| DmsError::ImageProcessing(e.to_string()))?;

        let faces = self.face_detector.detect(&gray)?;
        let Some(face) = faces.first().copied() else {
            return Ok(Classification::no_face());
        };

        // crop_imm clamps the region to the image bounds
        let face_roi =
            image::imageops::crop_imm(&gray, face.x, face.y, face.width, face.height).to_image();
        let eyes = self.eye_detector.detect(&face_roi)?;

        debug!(
            frame = frame.sequence,
            faces = faces.len(),
            eyes = eyes.len(),
            "Classified frame"
        );

        let observation = if eyes.len() < MIN_VISIBLE_EYES {
            FrameObservation::EyesClosed
        } else {
            FrameObservation::EyesOpen
        };

        Ok(Classification {
            observation,
            face: Some(face),
        })
    }
}
