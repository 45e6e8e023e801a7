//! Transient error signal channel.
//!
//! # Responsibility
//! - Deliver human-readable failure messages to one UI consumer, in order.
//! - Keep failures out of the observed session state.
//!
//! # Invariants
//! - `ErrorSender::send` never blocks or awaits.
//! - Messages sent before the consumer reads are buffered up to capacity.
//! - When the buffer is full the newest message is dropped and counted.
//! - There is exactly one receiver; late receivers do not get replays.

use crate::config::MAX_ERROR_BUFFER_CAPACITY;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Outcome of one `ErrorSender::send` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Buffer full; this message was discarded.
    DroppedFull,
    /// Consumer handle gone; this message was discarded.
    DroppedClosed,
}

/// Creates a bounded error channel with drop-newest overflow.
///
/// `capacity` is clamped to `1..=MAX_ERROR_BUFFER_CAPACITY`.
pub fn error_channel(capacity: usize) -> (ErrorSender, ErrorReceiver) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_ERROR_BUFFER_CAPACITY));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ErrorSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        ErrorReceiver { rx, dropped },
    )
}

#[derive(Debug, Clone)]
pub struct ErrorSender {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl ErrorSender {
    pub fn send(&self, message: impl Into<String>) -> SendOutcome {
        match self.tx.try_send(message.into()) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "event=error_signal module=auth status=dropped reason=buffer_full dropped_total={total}"
                );
                SendOutcome::DroppedFull
            }
            Err(TrySendError::Closed(_)) => {
                debug!("event=error_signal module=auth status=dropped reason=no_consumer");
                SendOutcome::DroppedClosed
            }
        }
    }
}

/// The single consumer end of the error channel.
#[derive(Debug)]
pub struct ErrorReceiver {
    rx: mpsc::Receiver<String>,
    dropped: Arc<AtomicU64>,
}

impl ErrorReceiver {
    /// Waits for the next message. `None` once every sender is gone and the
    /// buffer is drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Returns a buffered message without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Number of messages discarded because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::{error_channel, SendOutcome};

    #[tokio::test]
    async fn messages_arrive_in_send_order() {
        let (tx, mut rx) = error_channel(8);
        tx.send("first");
        tx.send("second");
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[test]
    fn full_buffer_drops_newest() {
        let (tx, mut rx) = error_channel(2);
        assert_eq!(tx.send("a"), SendOutcome::Queued);
        assert_eq!(tx.send("b"), SendOutcome::Queued);
        assert_eq!(tx.send("c"), SendOutcome::DroppedFull);
        assert_eq!(rx.dropped_count(), 1);
        assert_eq!(rx.try_recv().as_deref(), Some("a"));
        assert_eq!(rx.try_recv().as_deref(), Some("b"));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn send_after_consumer_dropped_is_discarded() {
        let (tx, rx) = error_channel(4);
        drop(rx);
        assert_eq!(tx.send("lost"), SendOutcome::DroppedClosed);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (tx, mut rx) = error_channel(0);
        assert_eq!(tx.send("only"), SendOutcome::Queued);
        assert_eq!(rx.try_recv().as_deref(), Some("only"));
    }

    #[test]
    fn oversized_capacity_is_clamped() {
        let (tx, mut rx) = error_channel(usize::MAX);
        assert_eq!(tx.send("kept"), SendOutcome::Queued);
        assert_eq!(rx.try_recv().as_deref(), Some("kept"));
    }
}
