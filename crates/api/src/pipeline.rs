//! Acquisition pipeline
//!
//! Runs on its own thread: read a frame, classify it, advance the drowsiness
//! state machine, publish the status, annotate and publish the JPEG. The
//! loop stops when the source stops producing frames or a stop is requested.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camera_capture::{CameraError, FrameSource, VideoFrame};
use dms::{DmsAlert, DmsAnalysis, DmsError, DmsModule, FrameClassifier};
use overlay::{OverlayError, StatusLabel};
use status_publisher::{EncodedFrame, FrameFeed, PublishedStatus, StatusPublisher};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("DMS error: {0}")]
    Dms(#[from] DmsError),

    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),

    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Acquisition thread panicked")]
    Panicked,
}

/// Why the acquisition loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source ran out of frames
    EndOfStream,
    /// A frame could not be read
    SourceFailed(String),
    /// A stop was requested
    Stopped,
}

/// Summary returned when the loop ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames_processed: u64,
    pub reason: StopReason,
}

/// Shared stop flag checked between frames
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Producer side of the monitor
pub struct Pipeline<S, C> {
    source: S,
    dms: DmsModule<C>,
    status: StatusPublisher,
    frames: FrameFeed,
    config: PipelineConfig,
}

impl<S, C> Pipeline<S, C>
where
    S: FrameSource + 'static,
    C: FrameClassifier + 'static,
{
    pub fn new(
        source: S,
        dms: DmsModule<C>,
        status: StatusPublisher,
        frames: FrameFeed,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            dms,
            status,
            frames,
            config,
        }
    }

    /// Run until the source ends or `stop` is raised; closes the frame feed
    pub fn run(mut self, stop: &StopSignal) -> PipelineReport {
        info!(
            policy = ?self.dms.config().policy,
            threshold = self.dms.config().threshold_frames,
            "Starting acquisition loop"
        );

        let delay = Duration::from_millis(self.config.loop_delay_ms);
        let mut frames_processed = 0u64;

        let reason = loop {
            if stop.is_raised() {
                break StopReason::Stopped;
            }

            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(CameraError::EndOfStream) => {
                    info!("Frame source exhausted");
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    warn!("Failed to grab frame: {}", e);
                    break StopReason::SourceFailed(e.to_string());
                }
            };

            self.process(&frame);
            frames_processed += 1;

            if !delay.is_zero() {
                thread::sleep(delay);
            }
        };

        self.frames.close();
        info!(frames_processed, reason = ?reason, "Acquisition loop stopped");

        PipelineReport {
            frames_processed,
            reason,
        }
    }

    /// Run on a dedicated thread
    pub fn spawn(self) -> Result<PipelineHandle, PipelineError> {
        let stop = StopSignal::new();
        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || self.run(&thread_stop))?;

        Ok(PipelineHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn process(&mut self, frame: &VideoFrame) {
        let analysis = self.dms.analyze(frame);

        self.status.update(PublishedStatus {
            is_drowsy: analysis.state.is_drowsy,
            closed_run_length: analysis.state.closed_run_length,
            frame_sequence: Some(frame.sequence),
        });
        record_metrics(&analysis);

        debug!(
            frame = frame.sequence,
            observation = analysis.observation.as_str(),
            closed_run_length = analysis.state.closed_run_length,
            is_drowsy = analysis.state.is_drowsy,
            "Processed frame"
        );

        match self.render(frame, &analysis) {
            Ok(encoded) => self.frames.publish(encoded),
            Err(e) => warn!("Dropping frame {} from stream: {}", frame.sequence, e),
        }
    }

    fn render(
        &self,
        frame: &VideoFrame,
        analysis: &DmsAnalysis,
    ) -> Result<EncodedFrame, PipelineError> {
        let label = StatusLabel::for_drowsiness(analysis.is_drowsy());
        let annotated = overlay::annotate(frame, label, analysis.face_bbox.as_ref())?;
        let jpeg = annotated.encode_jpeg(self.config.jpeg_quality)?;
        Ok(EncodedFrame::new(frame.sequence, jpeg))
    }
}

fn record_metrics(analysis: &DmsAnalysis) {
    metrics::counter!("drowsy_frames_processed_total").increment(1);
    metrics::gauge!("drowsy_closed_run_length").set(analysis.state.closed_run_length as f64);
    metrics::gauge!("drowsy_is_drowsy").set(if analysis.is_drowsy() { 1.0 } else { 0.0 });
    if analysis.alert == Some(DmsAlert::DrowsinessDetected) {
        metrics::counter!("drowsy_alerts_total").increment(1);
    }
}

/// Handle to a running acquisition thread
pub struct PipelineHandle {
    stop: StopSignal,
    thread: Option<JoinHandle<PipelineReport>>,
}

impl PipelineHandle {
    /// Request a stop after the current frame
    pub fn stop(&self) {
        self.stop.raise();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Wait for the thread to exit
    pub fn join(mut self) -> Result<PipelineReport, PipelineError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| PipelineError::Panicked),
            None => Err(PipelineError::Panicked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::{CameraConfig, SyntheticSource};
    use dms::{Classification, DmsConfig, DmsError, FrameObservation, Region};

    /// Closed eyes on every frame
    struct ClosedEyes;

    impl FrameClassifier for ClosedEyes {
        fn classify(&mut self, _frame: &VideoFrame) -> Result<Classification, DmsError> {
            Ok(Classification {
                observation: FrameObservation::EyesClosed,
                face: Some(Region::new(10, 10, 20, 20)),
            })
        }
    }

    /// Fails after yielding a fixed number of frames
    struct FlakySource {
        remaining: u32,
    }

    impl FrameSource for FlakySource {
        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            if self.remaining == 0 {
                return Err(CameraError::Decode {
                    path: "frame.jpg".into(),
                    reason: "truncated".into(),
                });
            }
            self.remaining -= 1;
            Ok(VideoFrame::solid(32, 24, [0, 0, 0], 0))
        }

        fn resolution(&self) -> (u32, u32) {
            (32, 24)
        }
    }

    fn unpaced() -> PipelineConfig {
        PipelineConfig {
            loop_delay_ms: 0,
            ..Default::default()
        }
    }

    fn dms(threshold: u32) -> DmsModule<ClosedEyes> {
        let config = DmsConfig {
            threshold_frames: threshold,
            ..Default::default()
        };
        DmsModule::new(config, ClosedEyes).unwrap()
    }

    #[test]
    fn test_runs_to_end_of_stream_and_publishes() {
        let status = StatusPublisher::new();
        let frames = FrameFeed::new();
        let source = SyntheticSource::new(32, 24).with_frame_limit(12);

        let report = Pipeline::new(source, dms(10), status.clone(), frames.clone(), unpaced())
            .run(&StopSignal::new());

        assert_eq!(report.frames_processed, 12);
        assert_eq!(report.reason, StopReason::EndOfStream);

        let published = status.read();
        assert!(published.is_drowsy);
        assert_eq!(published.closed_run_length, 12);
        assert_eq!(published.frame_sequence, Some(11));

        // Feed is closed once the loop ends
        assert!(frames.is_closed());
    }

    #[test]
    fn test_read_failure_stops_loop() {
        let status = StatusPublisher::new();
        let report = Pipeline::new(
            FlakySource { remaining: 3 },
            dms(10),
            status.clone(),
            FrameFeed::new(),
            unpaced(),
        )
        .run(&StopSignal::new());

        assert_eq!(report.frames_processed, 3);
        assert!(matches!(report.reason, StopReason::SourceFailed(_)));
        // Last published value is retained
        assert_eq!(status.read().closed_run_length, 3);
    }

    #[test]
    fn test_stop_signal_before_first_frame() {
        let stop = StopSignal::new();
        stop.raise();
        let report = Pipeline::new(
            SyntheticSource::new(32, 24),
            dms(10),
            StatusPublisher::new(),
            FrameFeed::new(),
            unpaced(),
        )
        .run(&stop);
        assert_eq!(report, PipelineReport { frames_processed: 0, reason: StopReason::Stopped });
    }

    #[test]
    fn test_spawned_pipeline_stops_on_request() {
        let source = camera_capture::open_source(&CameraConfig::synthetic(None)).unwrap();
        let frames = FrameFeed::new();
        let status = StatusPublisher::new();
        let handle = Pipeline::new(source, dms(3), status, frames.clone(), unpaced())
            .spawn()
            .unwrap();

        while frames.latest().is_none() {
            thread::sleep(Duration::from_millis(1));
        }
        handle.stop();
        let report = handle.join().unwrap();
        assert_eq!(report.reason, StopReason::Stopped);
        assert!(report.frames_processed > 0);
    }

    #[test]
    fn test_streamed_frames_are_jpeg() {
        let frames = FrameFeed::new();
        let mut pipeline = Pipeline::new(
            SyntheticSource::new(32, 24),
            dms(1),
            StatusPublisher::new(),
            frames.clone(),
            unpaced(),
        );
        pipeline.process(&VideoFrame::solid(32, 24, [10, 10, 10], 5));

        let latest = frames.latest().unwrap();
        assert_eq!(latest.sequence, 5);
        let decoded = image::load_from_memory(&latest.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }
}
