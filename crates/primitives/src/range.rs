//! Background-thread iteration, kept for existing callers
//!
//! `range()` and `range_kv()` snapshot the store up front and stream the
//! copies from a producer thread over a bounded channel. Prefer `select()`,
//! which needs no thread and stops as soon as the consumer does.

use crossbeam_channel::{bounded, Receiver};
use speicher_core::{Result, SpeicherError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::warn;

/// Elements buffered ahead of the consumer
const RANGE_BUFFER: usize = 16;

/// Consumer side of a background range
///
/// Iterating yields the snapshot in order. Call [`cancel`](Self::cancel) to
/// stop early; dropping the handle does the same.
pub struct RangeHandle<I> {
    rx: Option<Receiver<I>>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<I: Send + 'static> RangeHandle<I> {
    pub(crate) fn spawn(snapshot: Vec<I>) -> Result<Self> {
        let (tx, rx) = bounded(RANGE_BUFFER);
        let cancelled = Arc::new(AtomicBool::new(false));
        let token = Arc::clone(&cancelled);

        let worker = thread::Builder::new()
            .name("speicher-range".to_string())
            .spawn(move || {
                for item in snapshot {
                    if token.load(Ordering::Acquire) {
                        return;
                    }
                    if tx.send(item).is_err() {
                        return;
                    }
                }
            })
            .map_err(|source| SpeicherError::Spawn {
                what: "range",
                source,
            })?;

        Ok(RangeHandle {
            rx: Some(rx),
            cancelled,
            worker: Some(worker),
        })
    }
}

impl<I> RangeHandle<I> {
    /// Stop the producer and wait for it to exit
    pub fn cancel(mut self) {
        self.stop();
    }

    /// Whether the handle was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // Disconnecting wakes a producer blocked on a full channel
        self.rx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(target: "speicher::range", "Range producer panicked");
            }
        }
    }
}

impl<I> Iterator for RangeHandle<I> {
    type Item = I;

    fn next(&mut self) -> Option<I> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl<I> Drop for RangeHandle<I> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yields_snapshot_in_order() {
        let handle = RangeHandle::spawn((0..100).collect()).unwrap();
        let seen: Vec<i32> = handle.collect();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancel_stops_blocked_producer() {
        // Far more than the buffer, so the producer blocks on send
        let mut handle = RangeHandle::spawn((0..10_000).collect::<Vec<u32>>()).unwrap();
        assert_eq!(handle.next(), Some(0));
        assert_eq!(handle.next(), Some(1));
        handle.cancel();
    }

    #[test]
    fn test_drop_without_cancel_does_not_hang() {
        let mut handle = RangeHandle::spawn(vec!["a".to_string(); 1_000]).unwrap();
        assert!(handle.next().is_some());
        drop(handle);
    }

    #[test]
    fn test_empty_snapshot() {
        let mut handle = RangeHandle::spawn(Vec::<u8>::new()).unwrap();
        assert!(handle.next().is_none());
        assert!(!handle.is_cancelled());
    }
}
