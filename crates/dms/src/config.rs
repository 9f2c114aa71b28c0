//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::state::{DebouncePolicy, DEFAULT_THRESHOLD_FRAMES};
use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Consecutive closed-eye frames that trigger the drowsiness alert
    pub threshold_frames: u32,

    /// How open or missing-face frames unwind a closed-eye run
    pub policy: DebouncePolicy,

    /// Classification manifest for replayed recordings
    pub manifest_path: Option<String>,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            threshold_frames: DEFAULT_THRESHOLD_FRAMES,
            policy: DebouncePolicy::HardReset,
            manifest_path: None,
        }
    }
}

impl DmsConfig {
    /// Settings used by the wheel simulation
    pub fn simulation() -> Self {
        Self {
            policy: DebouncePolicy::Decay,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DmsError> {
        if self.threshold_frames == 0 {
            return Err(DmsError::Config(
                "threshold_frames must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_server_behaviour() {
        let config = DmsConfig::default();
        assert_eq!(config.threshold_frames, 10);
        assert_eq!(config.policy, DebouncePolicy::HardReset);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_simulation_preset() {
        assert_eq!(DmsConfig::simulation().policy, DebouncePolicy::Decay);
        assert_eq!(DmsConfig::simulation().threshold_frames, 10);
    }

    #[test]
    fn test_zero_threshold_invalid() {
        let config = DmsConfig {
            threshold_frames: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DmsConfig = serde_json::from_str(r#"{ "policy": "decay" }"#).unwrap();
        assert_eq!(config.policy, DebouncePolicy::Decay);
        assert_eq!(config.threshold_frames, 10);
    }
}
