//! Frame sources

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use image::imageops::{self, FilterType};
use tracing::{debug, info};

use crate::{CameraConfig, CameraError, SourceKind, VideoFrame};

/// File extensions accepted by [`ImageSequenceSource`]
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// A blocking producer of video frames.
///
/// `read_frame` may block until the next frame is due. Any error ends the
/// stream for the caller; sources are not expected to recover.
pub trait FrameSource: Send {
    /// Block until the next frame is available
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Nominal output resolution
    fn resolution(&self) -> (u32, u32);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        (**self).read_frame()
    }

    fn resolution(&self) -> (u32, u32) {
        (**self).resolution()
    }
}

/// Open the source described by `config`
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    if config.width == 0 || config.height == 0 {
        return Err(CameraError::Format(format!(
            "invalid resolution {}x{}",
            config.width, config.height
        )));
    }

    match config.kind {
        SourceKind::ImageSequence => Ok(Box::new(ImageSequenceSource::open(config)?)),
        SourceKind::Synthetic => {
            let mut source = SyntheticSource::new(config.width, config.height).with_fps(config.fps);
            if let Some(limit) = config.frame_limit {
                source = source.with_frame_limit(limit);
            }
            Ok(Box::new(source))
        }
    }
}

/// Sleeps just long enough to hold a target frame rate
#[derive(Debug)]
struct FramePacer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FramePacer {
    fn new(fps: u32) -> Self {
        Self {
            interval: (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64)),
            last: None,
        }
    }

    fn wait(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Replays a directory of recorded frames in file-name order
pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    cursor: usize,
    width: u32,
    height: u32,
    loop_playback: bool,
    pacer: FramePacer,
    opened_at: Instant,
    sequence: u32,
}

impl ImageSequenceSource {
    /// Open the directory named by `config.device`
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let dir = Path::new(&config.device);
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_supported_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(CameraError::Open(format!(
                "{}: no frames found",
                dir.display()
            )));
        }

        info!(
            "Opened image sequence {} ({} frames, {}x{} @ {} fps)",
            dir.display(),
            frames.len(),
            config.width,
            config.height,
            config.fps
        );

        Ok(Self {
            frames,
            cursor: 0,
            width: config.width,
            height: config.height,
            loop_playback: config.loop_playback,
            pacer: FramePacer::new(config.fps),
            opened_at: Instant::now(),
            sequence: 0,
        })
    }

    /// Number of frames in one pass over the directory
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.cursor >= self.frames.len() {
            if !self.loop_playback {
                return Err(CameraError::EndOfStream);
            }
            debug!("Image sequence exhausted, restarting playback");
            self.cursor = 0;
        }

        self.pacer.wait();

        let path = &self.frames[self.cursor];
        self.cursor += 1;

        let mut img = image::open(path)
            .map_err(|e| CameraError::Decode {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .to_rgb8();

        if img.dimensions() != (self.width, self.height) {
            img = imageops::resize(&img, self.width, self.height, FilterType::Triangle);
        }

        let frame = VideoFrame::from_rgb_image(
            img,
            self.opened_at.elapsed().as_nanos() as u64,
            self.sequence,
        );
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Generates mid-gray frames, optionally bounded in count
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_limit: Option<u32>,
    pacer: FramePacer,
    opened_at: Instant,
    sequence: u32,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_limit: None,
            pacer: FramePacer::new(0),
            opened_at: Instant::now(),
            sequence: 0,
        }
    }

    /// End the stream after `limit` frames
    pub fn with_frame_limit(mut self, limit: u32) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.pacer = FramePacer::new(fps);
        self
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.frame_limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(CameraError::EndOfStream);
        }

        self.pacer.wait();

        let mut frame = VideoFrame::solid(self.width, self.height, [128, 128, 128], self.sequence);
        frame.timestamp_ns = self.opened_at.elapsed().as_nanos() as u64;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
