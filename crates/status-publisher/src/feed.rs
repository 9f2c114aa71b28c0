//! Annotated frame slot for streaming clients

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// One JPEG-encoded, annotated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub sequence: u32,
    pub jpeg: Arc<[u8]>,
}

impl EncodedFrame {
    pub fn new(sequence: u32, jpeg: impl Into<Arc<[u8]>>) -> Self {
        Self {
            sequence,
            jpeg: jpeg.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum FeedState {
    Waiting,
    Frame(EncodedFrame),
    Closed,
}

/// Latest annotated frame, shared by every streaming client.
///
/// The producer publishes each frame once; each subscriber receives the most
/// recent frame it has not yet seen. Closing the feed ends every
/// subscription.
#[derive(Debug, Clone)]
pub struct FrameFeed {
    tx: Arc<watch::Sender<FeedState>>,
}

impl Default for FrameFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameFeed {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(FeedState::Waiting);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the latest frame; ignored once the feed is closed
    pub fn publish(&self, frame: EncodedFrame) {
        self.tx.send_if_modified(|state| match state {
            FeedState::Closed => false,
            _ => {
                *state = FeedState::Frame(frame);
                true
            }
        });
    }

    /// Mark the stream as finished
    pub fn close(&self) {
        debug!("Closing frame feed");
        self.tx.send_replace(FeedState::Closed);
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.tx.borrow(), FeedState::Closed)
    }

    /// Most recently published frame, if any
    pub fn latest(&self) -> Option<EncodedFrame> {
        match &*self.tx.borrow() {
            FeedState::Frame(frame) => Some(frame.clone()),
            _ => None,
        }
    }

    /// Subscribe starting from the current frame (if one exists)
    pub fn subscribe(&self) -> FrameSubscription {
        FrameSubscription {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }
}

/// Per-client cursor into a [`FrameFeed`]
#[derive(Debug)]
pub struct FrameSubscription {
    rx: watch::Receiver<FeedState>,
    primed: bool,
}

impl FrameSubscription {
    /// Wait for a frame this subscriber has not seen yet.
    ///
    /// The first call returns the current frame immediately when one is
    /// available. Returns `None` once the feed is closed or dropped.
    pub async fn next_frame(&mut self) -> Option<EncodedFrame> {
        loop {
            if self.primed {
                self.rx.changed().await.ok()?;
            }
            self.primed = true;

            // Resolve before the next await so the borrow guard is released
            let next = match &*self.rx.borrow_and_update() {
                FeedState::Frame(frame) => Some(Some(frame.clone())),
                FeedState::Closed => Some(None),
                FeedState::Waiting => None,
            };
            if let Some(next) = next {
                return next;
            }
        }
    }
}
