//! Hardware-independent core of the freq-rs reciprocal frequency counter.
//!
//! Everything here is pure logic shared between the RP2040 firmware and the
//! host test suite: the raw-count conversion math, the single-slot sample
//! latch, the acquisition state machine, and the CSV record format. Nothing
//! in this crate touches a peripheral; the firmware crate supplies the PIO
//! sequencers, the SD card, and the button and drives these types.

#![cfg_attr(not(test), no_std)]

pub mod acquisition;
pub mod config;
pub mod convert;
pub mod latch;
pub mod record;

pub use acquisition::{
    Acquisition, CapacityProbe, Control, Debouncer, LogSink, RunState, SampleOutcome,
};
pub use convert::RawSample;
pub use latch::SampleLatch;
pub use record::Measurement;
