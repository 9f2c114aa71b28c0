//! Drowsiness state machine
//!
//! Turns per-frame eye observations into a debounced drowsy flag. Two
//! debounce policies are supported and chosen when the machine is built:
//!
//! - [`DebouncePolicy::HardReset`]: any frame that is not `EyesClosed` drops
//!   the run length to zero and clears the alert on that same frame.
//! - [`DebouncePolicy::Decay`]: non-closed frames erode the run length by one,
//!   and the alert only clears once the run has fully decayed to zero.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::classifier::FrameObservation;
use crate::DmsError;

/// Default number of consecutive closed-eye frames that trips the alert
pub const DEFAULT_THRESHOLD_FRAMES: u32 = 10;

/// How a non-closed observation affects the closed-eye run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebouncePolicy {
    /// Reset the run and clear the alert immediately
    #[default]
    HardReset,
    /// Decrement the run; clear the alert only at zero
    Decay,
}

/// Drowsiness state (tracked over time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrowsinessState {
    /// Consecutive qualifying closed-eye frames
    pub closed_run_length: u32,
    /// Latched alert flag
    pub is_drowsy: bool,
}

impl DrowsinessState {
    /// Complement of the alert, shown as the wheel's RUNNING/STOPPED state
    pub fn is_running(&self) -> bool {
        !self.is_drowsy
    }
}

/// Pure state transition for one observed frame
pub fn transition(
    policy: DebouncePolicy,
    threshold: u32,
    previous: DrowsinessState,
    observation: FrameObservation,
) -> DrowsinessState {
    match (observation, policy) {
        (FrameObservation::EyesClosed, _) => {
            let closed_run_length = previous.closed_run_length.saturating_add(1);
            DrowsinessState {
                closed_run_length,
                // A closed frame can trip the alert but never clears it
                is_drowsy: previous.is_drowsy || closed_run_length >= threshold,
            }
        }
        (_, DebouncePolicy::HardReset) => DrowsinessState::default(),
        (_, DebouncePolicy::Decay) => {
            let closed_run_length = previous.closed_run_length.saturating_sub(1);
            DrowsinessState {
                closed_run_length,
                is_drowsy: previous.is_drowsy && closed_run_length > 0,
            }
        }
    }
}

/// Stateful wrapper applying [`transition`] with a fixed policy and threshold
#[derive(Debug, Clone)]
pub struct DrowsinessMachine {
    policy: DebouncePolicy,
    threshold: u32,
    state: DrowsinessState,
}

impl DrowsinessMachine {
    pub fn new(policy: DebouncePolicy, threshold: u32) -> Result<Self, DmsError> {
        if threshold == 0 {
            return Err(DmsError::Config(
                "drowsiness threshold must be at least one frame".into(),
            ));
        }

        Ok(Self {
            policy,
            threshold,
            state: DrowsinessState::default(),
        })
    }

    /// Feed one observation and return the new state
    pub fn observe(&mut self, observation: FrameObservation) -> DrowsinessState {
        let previous = self.state;
        self.state = transition(self.policy, self.threshold, previous, observation);

        if self.state.is_drowsy != previous.is_drowsy {
            info!(
                policy = ?self.policy,
                closed_run_length = self.state.closed_run_length,
                "Drowsiness {}",
                if self.state.is_drowsy { "detected" } else { "cleared" }
            );
        }

        self.state
    }

    pub fn state(&self) -> DrowsinessState {
        self.state
    }
}
