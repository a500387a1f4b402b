//! Progress reporting over a watch channel.
//!
//! The runner owns a `ProgressTracker` and publishes a fresh snapshot after
//! every skip, attempt, and on exit; displays hold the receiving end and
//! read the latest snapshot whenever they like. No counter is shared
//! mutably between the runner and its observers.

use tokio::sync::watch;

use gramreach_core::types::{RunProgress, StopReason};

/// Publishing side of a campaign's progress channel.
pub struct ProgressTracker {
    current: RunProgress,
    tx: watch::Sender<RunProgress>,
}

impl ProgressTracker {
    /// Create a tracker and its receiver, primed with the starting snapshot.
    pub fn channel(total: u32, limit: u32) -> (Self, watch::Receiver<RunProgress>) {
        let starting = RunProgress::starting(total, limit);
        let (tx, rx) = watch::channel(starting);
        (
            Self {
                current: starting,
                tx,
            },
            rx,
        )
    }

    /// A profile was dropped by the dedup snapshot.
    pub fn record_skip(&mut self) {
        self.current.skipped += 1;
        self.publish();
    }

    /// A send attempt succeeded.
    pub fn record_sent(&mut self) {
        self.current.attempted += 1;
        self.current.sent += 1;
        self.publish();
    }

    /// A send attempt failed.
    pub fn record_failed(&mut self) {
        self.current.attempted += 1;
        self.publish();
    }

    /// Publish the final snapshot with `done` set.
    pub fn finish(&mut self, reason: StopReason) {
        self.current.done = Some(reason);
        self.publish();
    }

    pub fn snapshot(&self) -> RunProgress {
        self.current
    }

    fn publish(&self) {
        // A CLI run has no observer; a dropped receiver is not an error.
        let _ = self.tx.send(self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_and_publishes() {
        let (mut tracker, rx) = ProgressTracker::channel(5, 3);
        assert_eq!(rx.borrow().total, 5);
        assert_eq!(rx.borrow().limit, 3);

        tracker.record_skip();
        tracker.record_sent();
        tracker.record_failed();

        let snap = *rx.borrow();
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.attempted, 2);
        assert_eq!(snap.sent, 1);
        assert!(snap.done.is_none());

        tracker.finish(StopReason::Completed);
        assert_eq!(rx.borrow().done, Some(StopReason::Completed));
    }

    #[test]
    fn test_publish_without_receiver_is_fine() {
        let (mut tracker, rx) = ProgressTracker::channel(1, 1);
        drop(rx);
        tracker.record_sent();
        tracker.finish(StopReason::Completed);
        assert_eq!(tracker.snapshot().sent, 1);
    }
}
