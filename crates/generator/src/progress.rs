//! Progress reporting channel.
//!
//! Generators push coarse percentage milestones into an unbounded channel;
//! the worker drains it and turns each message into one job record write.
//! The channel keeps generators decoupled from the store and keeps the
//! writes strictly ordered.

use tokio::sync::mpsc;

/// Sending half handed to a generator.
pub type ProgressSender = mpsc::UnboundedSender<u8>;

/// Receiving half drained by the worker.
pub type ProgressReceiver = mpsc::UnboundedReceiver<u8>;

/// Create a progress channel for one generation run.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Report a progress value, clamped to `0..=100`.
///
/// Send failures are ignored: a dropped receiver means nobody is
/// listening any more, which must not abort generation.
pub fn report(progress: &ProgressSender, value: u8) {
    let _ = progress.send(value.min(100));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_clamped_to_100() {
        let (tx, mut rx) = progress_channel();
        report(&tx, 250);
        report(&tx, 42);
        drop(tx);

        assert_eq!(rx.recv().await, Some(100));
        assert_eq!(rx.recv().await, Some(42));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn report_survives_dropped_receiver() {
        let (tx, rx) = progress_channel();
        drop(rx);
        report(&tx, 10);
    }
}
