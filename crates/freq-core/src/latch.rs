//! Single-slot sample latch between the counter engine and the acquisition
//! loop.
//!
//! The engine is the sole writer, the acquisition loop the sole reader.
//! Ownership of a sample transfers through [`SampleLatch::offer`] and
//! [`SampleLatch::take`]; while a sample sits unread the counters are held
//! inactive, so the latch can never be overwritten before it is consumed.
//! The halt-before-read, reactivate-after-read discipline is the only
//! locking the hand-off needs.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::convert::RawSample;

/// One latched [`RawSample`] plus a ready signal.
pub struct SampleLatch {
    slot: Mutex<CriticalSectionRawMutex, Cell<Option<RawSample>>>,
    ready: Signal<CriticalSectionRawMutex, ()>,
}

impl SampleLatch {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
            ready: Signal::new(),
        }
    }

    /// Writer side: latch a sample if the slot is free.
    ///
    /// Returns `false` without touching the stored sample when one is still
    /// unread; the caller defers. The counters are already halted at that
    /// point, so the next window simply does not open yet.
    pub fn offer(&self, sample: RawSample) -> bool {
        let accepted = self.slot.lock(|slot| {
            if slot.get().is_some() {
                false
            } else {
                slot.set(Some(sample));
                true
            }
        });
        if accepted {
            self.ready.signal(());
        }
        accepted
    }

    /// Reader side: drain the slot and clear the ready flag.
    pub fn take(&self) -> Option<RawSample> {
        self.ready.reset();
        self.slot.lock(Cell::take)
    }

    /// Reader side: resolve once a sample has been latched.
    pub async fn wait_ready(&self) {
        self.ready.wait().await;
    }

    pub fn is_ready(&self) -> bool {
        self.slot.lock(|slot| slot.get().is_some())
    }
}

impl Default for SampleLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: u32) -> RawSample {
        RawSample {
            clock_ticks: n,
            edge_ticks: n,
        }
    }

    #[test]
    fn latched_sample_round_trips() {
        let latch = SampleLatch::new();
        assert!(!latch.is_ready());
        assert!(latch.offer(sample(1)));
        assert!(latch.is_ready());
        assert_eq!(latch.take(), Some(sample(1)));
        assert!(!latch.is_ready());
        assert_eq!(latch.take(), None);
    }

    #[test]
    fn second_offer_is_refused_and_preserves_the_first() {
        let latch = SampleLatch::new();
        assert!(latch.offer(sample(1)));
        // The engine firing again while the loop lags must not clobber
        // the unread sample.
        assert!(!latch.offer(sample(2)));
        assert_eq!(latch.take(), Some(sample(1)));
        // Once drained the slot accepts again.
        assert!(latch.offer(sample(2)));
        assert_eq!(latch.take(), Some(sample(2)));
    }

    #[test]
    fn take_clears_the_ready_signal() {
        let latch = SampleLatch::new();
        assert!(latch.offer(sample(3)));
        let _ = latch.take();
        // A stale ready flag after draining would wake the reader with an
        // empty slot; take() must clear both together.
        assert!(!latch.is_ready());
        assert_eq!(latch.take(), None);
    }
}
