//! Run/stop button.
//!
//! Active-low momentary button to ground; the electrical edge is all that is
//! read here. The 1000 ms minimum interval between accepted presses is the
//! acquisition state machine's job (`freq_core::Debouncer`), not this
//! module's.

use embassy_rp::gpio::Input;

pub struct RunButton<'d> {
    input: Input<'d>,
}

impl<'d> RunButton<'d> {
    pub fn new(input: Input<'d>) -> Self {
        Self { input }
    }

    /// Resolves on the next press (falling edge).
    pub async fn wait_for_press(&mut self) {
        self.input.wait_for_falling_edge().await;
    }
}
