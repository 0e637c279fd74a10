//! Measurement records and the CSV log format.
//!
//! One row per closed window, comma-space separated, CRLF terminated,
//! preceded by a single header row. Rows are append-only and never mutated;
//! a new file is created per run session, named from a timestamp-derived tag
//! so sessions never collide.

use core::fmt::{self, Write};

use crate::config::CALIBRATED_CLOCK_HZ;
use crate::convert::{self, RawSample};

/// Header row written once at the top of every session file.
pub const CSV_HEADER: &str = "sample, time, clock, pulses, frequency\r\n";

/// A fully converted measurement, derived from one [`RawSample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Position within the run session, starting at 0.
    pub index: u32,
    /// Milliseconds since boot at the time the sample was consumed.
    pub timestamp_ms: u64,
    /// Elapsed sequencer cycles in the window.
    pub clock_count: u64,
    /// Input edges counted in the window.
    pub pulse_count: u32,
    /// Derived frequency.
    pub frequency_hz: f64,
}

impl Measurement {
    /// Convert a drained raw sample using the calibrated reference clock.
    pub fn from_raw(raw: RawSample, index: u32, timestamp_ms: u64) -> Self {
        let clock_count = convert::clock_cycles(raw.clock_ticks);
        let pulse_count = convert::edge_count(raw.edge_ticks);
        let frequency_hz = convert::frequency_hz(pulse_count, clock_count, CALIBRATED_CLOCK_HZ);
        Self {
            index,
            timestamp_ms,
            clock_count,
            pulse_count,
            frequency_hz,
        }
    }

    /// Append this record as one CSV row.
    pub fn write_csv<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "{}, {}, {}, {}, {}\r\n",
            self.index, self.timestamp_ms, self.clock_count, self.pulse_count, self.frequency_hz
        )
    }
}

/// 8.3 session file name derived from a millisecond timestamp.
///
/// The tag is the session start time in whole seconds, wrapped to six
/// digits; within one boot the tag is strictly increasing, so a new session
/// never reuses an existing name.
pub fn session_file_name(now_ms: u64) -> heapless::String<12> {
    let tag = (now_ms / 1000) % 1_000_000;
    let mut name = heapless::String::new();
    // Writes of this length cannot fail on a 12-byte string.
    let _ = write!(name, "FC{tag:06}.CSV");
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_format_matches_the_log_layout() {
        let m = Measurement {
            index: 5,
            timestamp_ms: 1234,
            clock_count: 2,
            pulse_count: 0,
            frequency_hz: 0.0,
        };
        let mut row = heapless::String::<96>::new();
        m.write_csv(&mut row).unwrap();
        assert_eq!(row.as_str(), "5, 1234, 2, 0, 0\r\n");
    }

    #[test]
    fn integral_frequencies_print_without_a_fraction() {
        let m = Measurement {
            index: 0,
            timestamp_ms: 10,
            clock_count: 125_000_000,
            pulse_count: 1000,
            frequency_hz: 1000.0,
        };
        let mut row = heapless::String::<96>::new();
        m.write_csv(&mut row).unwrap();
        assert_eq!(row.as_str(), "0, 10, 125000000, 1000, 1000\r\n");
    }

    #[test]
    fn from_raw_applies_the_conversion_constants() {
        let raw = RawSample {
            clock_ticks: convert::MAX_COUNT,
            edge_ticks: convert::MAX_COUNT,
        };
        let m = Measurement::from_raw(raw, 7, 42);
        assert_eq!(m.index, 7);
        assert_eq!(m.timestamp_ms, 42);
        assert_eq!(m.clock_count, 2);
        assert_eq!(m.pulse_count, 0);
        assert_eq!(m.frequency_hz, 0.0);
    }

    #[test]
    fn session_names_are_short_and_ordered() {
        assert_eq!(session_file_name(0).as_str(), "FC000000.CSV");
        assert_eq!(session_file_name(65_000).as_str(), "FC000065.CSV");
        // Wraps at six digits rather than overflowing the 8.3 name.
        assert_eq!(session_file_name(1_000_000_000).as_str(), "FC000000.CSV");
    }
}
