//! Wheel simulation run
//!
//! Drives the drowsiness state machine (normally with the decay policy) over
//! a frame source and writes, per frame, the annotated camera image and the
//! wheel image to an output directory.

use std::fs;
use std::path::{Path, PathBuf};

use camera_capture::{CameraError, FrameSource};
use dms::{DmsConfig, DmsModule, FrameClassifier};
use overlay::{StatusLabel, Wheel};
use tracing::{debug, info, warn};

use crate::pipeline::PipelineError;

/// Summary of a simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub frames: u32,
    /// Frames during which the wheel was stopped
    pub stopped_frames: u32,
    pub final_angle: u32,
    pub out_dir: PathBuf,
}

/// Run the simulation until the source ends or `max_frames` is reached
pub fn run_simulation<S, C>(
    mut source: S,
    classifier: C,
    dms: DmsConfig,
    out_dir: &Path,
    max_frames: Option<u32>,
) -> Result<SimulationReport, PipelineError>
where
    S: FrameSource,
    C: FrameClassifier,
{
    let mut module = DmsModule::new(dms, classifier)?;

    fs::create_dir_all(out_dir)?;
    info!("Writing simulation frames to {}", out_dir.display());

    let mut wheel = Wheel::new();
    let mut frames = 0u32;
    let mut stopped_frames = 0u32;

    while max_frames.map_or(true, |max| frames < max) {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(CameraError::EndOfStream) => break,
            Err(e) => {
                warn!("Failed to grab frame: {}", e);
                break;
            }
        };

        let analysis = module.analyze(&frame);
        let running = analysis.state.is_running();
        wheel.advance(running);
        if !running {
            stopped_frames += 1;
        }

        let label = StatusLabel::for_observation(analysis.observation);
        let annotated = overlay::annotate(&frame, label, analysis.face_bbox.as_ref())?;
        annotated
            .to_rgb_image()?
            .save(out_dir.join(format!("frame_{:05}.png", frame.sequence)))?;
        wheel
            .render(running)?
            .save(out_dir.join(format!("wheel_{:05}.png", frame.sequence)))?;

        debug!(
            frame = frame.sequence,
            angle = wheel.angle(),
            running,
            "Simulation step"
        );
        frames += 1;
    }

    info!(frames, stopped_frames, "Simulation finished");

    Ok(SimulationReport {
        frames,
        stopped_frames,
        final_angle: wheel.angle(),
        out_dir: out_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::{SyntheticSource, VideoFrame};
    use dms::{Classification, DebouncePolicy, DmsError, FrameObservation, Region};

    /// Eyes closed for the first `closed` frames, open afterwards
    struct ClosedThenOpen {
        closed: u32,
        seen: u32,
    }

    impl FrameClassifier for ClosedThenOpen {
        fn classify(&mut self, _frame: &VideoFrame) -> Result<Classification, DmsError> {
            self.seen += 1;
            let observation = if self.seen <= self.closed {
                FrameObservation::EyesClosed
            } else {
                FrameObservation::EyesOpen
            };
            Ok(Classification {
                observation,
                face: Some(Region::new(4, 4, 16, 12)),
            })
        }
    }

    #[test]
    fn test_wheel_stops_while_drowsy_and_resumes_after_decay() {
        let dir = tempfile::tempdir().unwrap();
        let dms = DmsConfig {
            threshold_frames: 3,
            ..DmsConfig::simulation()
        };

        // Closed run peaks at 4, decays to 0 four frames later
        let report = run_simulation(
            SyntheticSource::new(32, 24).with_frame_limit(10),
            ClosedThenOpen { closed: 4, seen: 0 },
            dms,
            dir.path(),
            None,
        )
        .unwrap();

        assert_eq!(report.frames, 10);
        // Stopped from the 3rd closed frame until the run decays to zero
        assert_eq!(report.stopped_frames, 5);
        assert_eq!(report.final_angle, 5 * overlay::WHEEL_STEP_DEGREES);

        assert!(dir.path().join("frame_00000.png").exists());
        assert!(dir.path().join("wheel_00009.png").exists());
        let wheel = image::open(dir.path().join("wheel_00004.png")).unwrap();
        assert_eq!((wheel.width(), wheel.height()), (400, 400));
    }

    #[test]
    fn test_hard_reset_policy_restarts_wheel_on_first_open_frame() {
        let dir = tempfile::tempdir().unwrap();
        let dms = DmsConfig {
            threshold_frames: 3,
            policy: DebouncePolicy::HardReset,
            ..Default::default()
        };
        let report = run_simulation(
            SyntheticSource::new(32, 24).with_frame_limit(10),
            ClosedThenOpen { closed: 4, seen: 0 },
            dms,
            dir.path(),
            None,
        )
        .unwrap();
        assert_eq!(report.stopped_frames, 2);
    }

    /// Yields `remaining` frames, then fails to decode
    struct TruncatedSource {
        remaining: u32,
        sequence: u32,
    }

    impl FrameSource for TruncatedSource {
        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            if self.remaining == 0 {
                return Err(CameraError::Decode {
                    path: "frame_00003.jpg".into(),
                    reason: "truncated".into(),
                });
            }
            self.remaining -= 1;
            let frame = VideoFrame::solid(16, 16, [0, 0, 0], self.sequence);
            self.sequence += 1;
            Ok(frame)
        }

        fn resolution(&self) -> (u32, u32) {
            (16, 16)
        }
    }

    #[test]
    fn test_read_failure_ends_run_and_keeps_written_frames() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_simulation(
            TruncatedSource {
                remaining: 3,
                sequence: 0,
            },
            ClosedThenOpen { closed: 0, seen: 0 },
            DmsConfig::simulation(),
            dir.path(),
            None,
        )
        .unwrap();
        assert_eq!(report.frames, 3);
        assert!(dir.path().join("frame_00002.png").exists());
        assert!(dir.path().join("wheel_00002.png").exists());
    }

    #[test]
    fn test_max_frames_bounds_run() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_simulation(
            SyntheticSource::new(16, 16),
            ClosedThenOpen { closed: 0, seen: 0 },
            DmsConfig::simulation(),
            dir.path(),
            Some(2),
        )
        .unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.stopped_frames, 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }
}
