//! Status Publishing
//!
//! Single-writer, many-reader slots that always hold the most recent value.
//! Readers never see a partially written value and never queue: a reader
//! slower than the writer simply observes the latest write.

mod feed;
mod status;

pub use feed::{EncodedFrame, FrameFeed, FrameSubscription};
pub use status::{PublishedStatus, StatusPublisher};
