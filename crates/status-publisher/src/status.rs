//! Drowsiness status slot

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Snapshot of the drowsiness state exposed to readers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PublishedStatus {
    /// Latched drowsiness alert
    pub is_drowsy: bool,
    /// Consecutive closed-eye frames behind the alert
    pub closed_run_length: u32,
    /// Sequence number of the frame this status was derived from
    pub frame_sequence: Option<u32>,
}

/// Owned handle to the shared status slot.
///
/// Clones share the same slot. The acquisition loop calls [`update`] once
/// per frame; any number of tasks or threads may [`read`] concurrently.
///
/// [`update`]: StatusPublisher::update
/// [`read`]: StatusPublisher::read
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    tx: Arc<watch::Sender<PublishedStatus>>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    /// Create a publisher holding the initial (not drowsy) status
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PublishedStatus::default());
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current status
    pub fn update(&self, status: PublishedStatus) {
        self.tx.send_replace(status);
    }

    /// Latest published status
    pub fn read(&self) -> PublishedStatus {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn status(sequence: u32) -> PublishedStatus {
        // Fields are derived from the sequence so a torn value would be detectable
        PublishedStatus {
            is_drowsy: sequence % 3 == 0,
            closed_run_length: sequence * 7,
            frame_sequence: Some(sequence),
        }
    }

    #[test]
    fn test_initial_status_is_not_drowsy() {
        let publisher = StatusPublisher::new();
        assert_eq!(publisher.read(), PublishedStatus::default());
    }

    #[test]
    fn test_latest_write_wins() {
        let publisher = StatusPublisher::new();
        for seq in 0..5 {
            publisher.update(status(seq));
        }
        assert_eq!(publisher.read(), status(4));
    }

    #[test]
    fn test_clones_share_slot() {
        let writer = StatusPublisher::new();
        let reader = writer.clone();
        writer.update(status(3));
        assert!(reader.read().is_drowsy);
    }

    #[test]
    fn test_concurrent_readers_only_observe_written_values() {
        const WRITES: u32 = 20_000;

        let publisher = StatusPublisher::new();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let publisher = publisher.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut observed = HashSet::new();
                    while !done.load(Ordering::Acquire) {
                        observed.insert(publisher.read());
                    }
                    observed.insert(publisher.read());
                    observed
                })
            })
            .collect();

        for seq in 0..WRITES {
            publisher.update(status(seq));
        }
        done.store(true, Ordering::Release);

        let written: HashSet<PublishedStatus> = (0..WRITES)
            .map(status)
            .chain(std::iter::once(PublishedStatus::default()))
            .collect();

        for reader in readers {
            let observed = reader.join().unwrap();
            assert!(observed.is_subset(&written));
            assert!(observed.contains(&status(WRITES - 1)));
        }
    }
}
