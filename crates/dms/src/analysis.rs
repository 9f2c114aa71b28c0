//! DMS analysis results and alerts

use serde::{Deserialize, Serialize};

use crate::classifier::{FrameObservation, Region};
use crate::state::DrowsinessState;

/// Edge of the drowsiness flag produced by a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmsAlert {
    /// Eyes stayed closed long enough to raise the alert
    DrowsinessDetected,

    /// The alert was released
    DrowsinessCleared,
}

impl DmsAlert {
    /// Alert raised by moving from `previous` to `current`, if any
    pub fn between(previous: &DrowsinessState, current: &DrowsinessState) -> Option<Self> {
        match (previous.is_drowsy, current.is_drowsy) {
            (false, true) => Some(Self::DrowsinessDetected),
            (true, false) => Some(Self::DrowsinessCleared),
            _ => None,
        }
    }
}

/// Complete DMS analysis result for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Frame the analysis belongs to
    pub sequence: u32,

    /// What the classifier reported
    pub observation: FrameObservation,

    /// Face bounding box (if detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_bbox: Option<Region>,

    /// Drowsiness state after this frame
    pub state: DrowsinessState,

    /// Alert edge caused by this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<DmsAlert>,
}

impl DmsAnalysis {
    pub fn face_detected(&self) -> bool {
        self.observation != FrameObservation::NoFace
    }

    pub fn is_drowsy(&self) -> bool {
        self.state.is_drowsy
    }
}
