//! Raw countdown values to physical quantities.
//!
//! Both counter sequencers count *down* from a large seed, so the interesting
//! number is how far they got. The clock counter spends two sequencer cycles
//! per decrement (one conditional branch, one decrement), hence the factor of
//! two, and loses the terminal tick to decrement-before-check ordering, hence
//! the `+ 1`. The pulse counter decrements exactly once per input edge with
//! no correction. These constants are properties of the sequencer programs'
//! instruction timing and must track them exactly.

/// Seed of the clock counter; the pulse counter is seeded with `MAX_COUNT - 1`.
pub const MAX_COUNT: u32 = u32::MAX;

/// One window's worth of latched counter results, exactly as drained from the
/// two result FIFOs. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// Remaining clock-counter value at window close.
    pub clock_ticks: u32,
    /// Remaining pulse-counter value at window close.
    pub edge_ticks: u32,
}

/// Elapsed sequencer cycles in the window: `2 * (MAX_COUNT - raw + 1)`.
pub const fn clock_cycles(raw: u32) -> u64 {
    2 * ((MAX_COUNT - raw) as u64 + 1)
}

/// Input edges counted in the window: `MAX_COUNT - raw`.
pub const fn edge_count(raw: u32) -> u32 {
    MAX_COUNT - raw
}

/// Reciprocal-count frequency: `pulses * (reference / clocks)`.
///
/// `clocks` is never zero (the minimum from [`clock_cycles`] is 2), so the
/// division is always defined.
pub fn frequency_hz(pulses: u32, clocks: u64, reference_hz: f64) -> f64 {
    pulses as f64 * (reference_hz / clocks as f64)
}
