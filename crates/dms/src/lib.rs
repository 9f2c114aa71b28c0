//! Driver Monitoring System (DMS)
//!
//! Drowsiness detection from per-frame eye state:
//! - Face and eye classification (pluggable detectors)
//! - Replay classification from recorded manifests
//! - Debounced drowsiness state machine (hard-reset or decay policy)
//!
//! Face and eye detectors are not part of this crate; they are supplied by the
//! caller through [`RegionDetector`].

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod manifest;
pub mod state;

pub use analysis::{DmsAlert, DmsAnalysis};
pub use classifier::{
    CascadeClassifier, Classification, FrameClassifier, FrameObservation, Region, RegionDetector,
};
pub use config::DmsConfig;
pub use manifest::{Manifest, ManifestClassifier};
pub use state::{transition, DebouncePolicy, DrowsinessMachine, DrowsinessState};

use camera_capture::VideoFrame;
use thiserror::Error;
use tracing::warn;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}

/// Driver monitoring module: classifier plus drowsiness state machine
pub struct DmsModule<C> {
    config: DmsConfig,
    classifier: C,
    machine: DrowsinessMachine,
}

impl<C: FrameClassifier> DmsModule<C> {
    /// Create a new DMS module with configuration
    pub fn new(config: DmsConfig, classifier: C) -> Result<Self, DmsError> {
        config.validate()?;
        Ok(Self {
            machine: DrowsinessMachine::new(config.policy, config.threshold_frames)?,
            classifier,
            config,
        })
    }

    /// Analyze a single frame for driver state.
    ///
    /// Classifier failures are logged and the frame counts as `NoFace`, so
    /// the state machine still advances exactly once per frame.
    pub fn analyze(&mut self, frame: &VideoFrame) -> DmsAnalysis {
        let classification = self.classifier.classify(frame).unwrap_or_else(|e| {
            warn!("Classification failed for frame {}: {}", frame.sequence, e);
            Classification::no_face()
        });

        let previous = self.machine.state();
        let state = self.machine.observe(classification.observation);

        DmsAnalysis {
            sequence: frame.sequence,
            observation: classification.observation,
            face_bbox: classification.face,
            state,
            alert: DmsAlert::between(&previous, &state),
        }
    }

    pub fn state(&self) -> DrowsinessState {
        self.machine.state()
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }
}
