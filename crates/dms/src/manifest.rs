//! Replay classifier driven by a recorded JSON manifest
//!
//! A manifest lists, per frame sequence number, the observation an offline
//! detector produced for that frame:
//!
//! ```json
//! {
//!   "repeat_every": 120,
//!   "frames": [
//!     { "sequence": 0, "observation": "eyes_open",
//!       "face": { "x": 220, "y": 120, "width": 200, "height": 200 } },
//!     { "sequence": 1, "observation": "eyes_closed",
//!       "face": { "x": 221, "y": 121, "width": 198, "height": 198 } }
//!   ]
//! }
//! ```
//!
//! Frames missing from the manifest are reported as `no_face`.

use std::collections::HashMap;
use std::path::Path;

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::{Classification, FrameClassifier, FrameObservation, Region};
use crate::DmsError;

/// One labelled frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sequence: u32,
    pub observation: FrameObservation,
    #[serde(default)]
    pub face: Option<Region>,
}

/// On-disk manifest format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Wrap sequence numbers modulo this period (for looping playback)
    #[serde(default)]
    pub repeat_every: Option<u32>,
    pub frames: Vec<ManifestEntry>,
}

/// Looks up each frame's classification by sequence number
#[derive(Debug, Clone, Default)]
pub struct ManifestClassifier {
    entries: HashMap<u32, Classification>,
    repeat_every: Option<u32>,
}

impl ManifestClassifier {
    /// Classifier with no labels; every frame is `NoFace`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_manifest(manifest: Manifest) -> Result<Self, DmsError> {
        if manifest.repeat_every == Some(0) {
            return Err(DmsError::Config("manifest repeat_every must be positive".into()));
        }

        let entries = manifest
            .frames
            .into_iter()
            .map(|entry| {
                (
                    entry.sequence,
                    Classification {
                        observation: entry.observation,
                        face: entry.face,
                    },
                )
            })
            .collect();

        Ok(Self {
            entries,
            repeat_every: manifest.repeat_every,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DmsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| DmsError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        let classifier = Self::from_manifest(manifest)?;
        info!(
            "Loaded classification manifest {} ({} labelled frames)",
            path.display(),
            classifier.len()
        );
        Ok(classifier)
    }

    /// Number of labelled frames
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FrameClassifier for ManifestClassifier {
    fn classify(&mut self, frame: &VideoFrame) -> Result<Classification, DmsError> {
        let key = match self.repeat_every {
            Some(period) => frame.sequence % period,
            None => frame.sequence,
        };
        Ok(self
            .entries
            .get(&key)
            .copied()
            .unwrap_or_else(Classification::no_face))
    }
}
