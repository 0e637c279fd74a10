//! Fixed measurement parameters.
//!
//! These are hardware configuration constants, set at build time and not
//! runtime-reconfigurable: the sequencer clock, the calibration constant the
//! frequency math uses instead of the nominal clock, the gate-time values
//! armed into the gate sequencer, and the acquisition-loop policies.

/// Nominal PIO/sequencer clock on the RP2040 (divider 1).
pub const SEQUENCER_CLOCK_HZ: u32 = 125_000_000;

/// Measured reference frequency used for the frequency computation.
///
/// The on-board oscillator runs slightly fast of nominal; using the measured
/// value here instead of [`SEQUENCER_CLOCK_HZ`] removes that scale error from
/// every reading.
pub const CALIBRATED_CLOCK_HZ: f64 = 125_000_208.6;

/// Gate-low cycle count for the first window of a session (about one second).
///
/// The long settling window lets the input conditioning and the operator
/// catch up before the steady cadence starts.
pub const GATE_STARTUP_CYCLES: u32 = SEQUENCER_CLOCK_HZ;

/// Gate-low cycle count armed before every subsequent window (about 1 ms).
pub const GATE_WINDOW_CYCLES: u32 = 125_000;

/// Records between free-space probes of the storage collaborator.
pub const CAPACITY_CHECK_INTERVAL: u32 = 256;

/// Free fraction below which the acquisition loop halts terminally.
pub const CAPACITY_MIN_FREE: f32 = 0.10;

/// Minimum interval between accepted button transitions.
pub const BUTTON_DEBOUNCE_MS: u64 = 1000;

/// Idle polls of the sample latch before a "no signal" advisory is emitted.
///
/// The advisory cadence is tick-based rather than wall-clock based; treat it
/// as a tunable.
pub const IDLE_TICKS_PER_ADVISORY: u32 = 4;
