//! RP2040-specific modules for freq-rs
//!
//! This crate contains the hardware half of the reciprocal frequency
//! counter: the three PIO sequencer programs and their driver, the counter
//! engine task that services the window-closed interrupt, the SD-card CSV
//! session logger, and the run/stop button. The measurement logic itself
//! lives in `freq-core` and is driven from here.

#![no_std]

pub mod button;
pub mod engine;
pub mod sdlog;
pub mod sequencer;
