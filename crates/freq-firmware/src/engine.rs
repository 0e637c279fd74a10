//! Counter engine task.
//!
//! Plays the interrupt-handler role from the acquisition loop's point of
//! view: it services the gate's window-closed interrupt, freezes the
//! counters, and hands the drained result over through the global
//! [`SampleLatch`]. It does no arithmetic and no I/O of its own; the
//! conversion and logging happen on the other side of the latch.
//!
//! The acquisition loop talks back through [`ENGINE_COMMANDS`]; the engine
//! is the sole owner of the PIO state machines, so session starts, window
//! re-arms, and halts all funnel through here.

use embassy_futures::select::{Either, select};
use embassy_rp::peripherals::PIO0;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use freq_core::SampleLatch;
use log::debug;

use crate::sequencer::ReciprocalCounter;

/// Single-slot hand-off between the engine and the acquisition loop.
pub static SAMPLE_LATCH: SampleLatch = SampleLatch::new();

/// Sequencer commands from the acquisition loop.
pub static ENGINE_COMMANDS: Channel<CriticalSectionRawMutex, EngineCommand, 4> = Channel::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Reset everything and start counting a fresh session.
    StartSession,
    /// The latched sample was consumed; open the next window.
    Resume,
    /// Stop counting (button stop or terminal halt).
    Halt,
}

#[embassy_executor::task]
pub async fn engine_task(mut counter: ReciprocalCounter<'static, PIO0>) {
    loop {
        match select(counter.window_closed(), ENGINE_COMMANDS.receive()).await {
            Either::First(()) => {
                // Window closed: pull the results in, then freeze the
                // counters before publishing. While the latch is occupied
                // the counters stay frozen and the gate stays un-armed.
                match select(counter.drain(), ENGINE_COMMANDS.receive()).await {
                    Either::First(raw) => {
                        counter.freeze();
                        if !SAMPLE_LATCH.offer(raw) {
                            // Defined deferral: the previous sample is still
                            // unread, so this window's opening waits for the
                            // loop's Resume.
                            debug!("sample latch occupied; deferring");
                        }
                    }
                    // Usually a stop pressed while the input signal is gone
                    // and the results will never arrive.
                    Either::Second(cmd) => apply(&mut counter, cmd).await,
                }
            }
            Either::Second(cmd) => apply(&mut counter, cmd).await,
        }
    }
}

async fn apply(counter: &mut ReciprocalCounter<'static, PIO0>, cmd: EngineCommand) {
    match cmd {
        EngineCommand::StartSession => counter.start_session().await,
        EngineCommand::Resume => counter.arm_next_window().await,
        EngineCommand::Halt => counter.shutdown(),
    }
}
