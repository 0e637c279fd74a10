//! Firmware entry point for the reciprocal frequency counter.
//!
//! Wires the PIO sequencers, the SD card logger, and the run/stop button
//! together, then drives the acquisition state machine from the main task
//! while [`engine_task`] services the counting hardware.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_futures::select::{Either3, select3};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_rp::spi::{self, Spi};
use embassy_time::{Delay, Duration, Instant, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use freq_core::{Acquisition, CapacityProbe, Control, RunState, SampleOutcome};
use freq_firmware::button::RunButton;
use freq_firmware::engine::{ENGINE_COMMANDS, EngineCommand, SAMPLE_LATCH, engine_task};
use freq_firmware::sdlog::SdCardLog;
use freq_firmware::sequencer::ReciprocalCounter;
use log::{error, info, warn};

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

/// How long the main task waits for a latched sample before running an
/// idle tick. Several of these have to elapse before the dead-signal
/// advisory fires, so the advisory period is this times
/// [`freq_core::config::IDLE_TICKS_PER_ADVISORY`].
const IDLE_POLL_PERIOD: Duration = Duration::from_secs(2);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("PANIC: {}", info);
    loop {
        cortex_m::asm::wfe();
    }
}

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

/// Forwards a control decision from the acquisition state machine to the
/// counting engine.
async fn dispatch(control: Control) {
    let command = match control {
        Control::Start => EngineCommand::StartSession,
        Control::Resume => EngineCommand::Resume,
        Control::Halt => EngineCommand::Halt,
    };

    ENGINE_COMMANDS.send(command).await;
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_log!();

    let p = embassy_rp::init(Default::default());

    let Pio {
        mut common,
        irq0,
        sm0,
        sm1,
        sm2,
        ..
    } = Pio::new(p.PIO0, Irqs);

    let input = common.make_pio_pin(p.PIN_15);
    let gate_pin = common.make_pio_pin(p.PIN_14);
    let done_pin = common.make_pio_pin(p.PIN_13);

    let counter = ReciprocalCounter::new(&mut common, irq0, sm0, sm1, sm2, input, gate_pin, done_pin);
    spawner
        .spawn(engine_task(counter))
        .expect("failed to spawn the counting engine task");

    let mut spi_config = spi::Config::default();
    spi_config.frequency = 16_000_000;
    let spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_4, spi_config);
    let cs = Output::new(p.PIN_5, Level::High);
    let spi_device =
        ExclusiveDevice::new_no_delay(spi, cs).expect("failed to claim the SD card SPI bus");
    let sd_card = SdCard::new(spi_device, Delay);

    let storage = SdCardLog::new(sd_card);
    let mut acquisition = Acquisition::new(storage);

    let free = acquisition.storage_mut().free_fraction();
    info!("storage free: {:.1}%", free * 100.0);

    let mut button = RunButton::new(Input::new(p.PIN_16, Pull::Up));

    loop {
        match acquisition.state() {
            RunState::AwaitingStart | RunState::Stopped => {
                info!("press the button to start a measurement run");
                button.wait_for_press().await;

                match acquisition.press_button(now_ms()) {
                    Ok(Some(Control::Start)) => {
                        // A sample latched by a previous run would otherwise
                        // be recorded into the new session.
                        let _ = SAMPLE_LATCH.take();
                        dispatch(Control::Start).await;
                        info!("measurement run started");
                    }
                    Ok(_) => {}
                    Err(err) => error!("failed to open a log session: {}", err),
                }
            }
            RunState::Running => {
                match select3(
                    SAMPLE_LATCH.wait_ready(),
                    button.wait_for_press(),
                    Timer::after(IDLE_POLL_PERIOD),
                )
                .await
                {
                    Either3::First(()) => {
                        let Some(raw) = SAMPLE_LATCH.take() else {
                            continue;
                        };

                        match acquisition.handle_sample(raw, now_ms()) {
                            Ok(SampleOutcome::Recorded {
                                measurement,
                                control,
                            }) => {
                                info!(
                                    "sample {}: {} clocks, {} pulses, {} Hz",
                                    measurement.index,
                                    measurement.clock_count,
                                    measurement.pulse_count,
                                    measurement.frequency_hz,
                                );
                                dispatch(control).await;

                                if acquisition.state() == RunState::StorageExhausted {
                                    error!("storage nearly full; measurement run halted");
                                }
                            }
                            Ok(SampleOutcome::Ignored) => {}
                            Err(err) => {
                                error!("failed to append a record: {}", err);
                                dispatch(Control::Halt).await;
                            }
                        }
                    }
                    Either3::Second(()) => {
                        if let Ok(Some(Control::Halt)) = acquisition.press_button(now_ms()) {
                            dispatch(Control::Halt).await;
                            let free = acquisition.storage_mut().free_fraction();
                            info!("measurement run stopped; storage free: {:.1}%", free * 100.0);
                        }
                    }
                    Either3::Third(()) => {
                        if acquisition.idle_tick() {
                            warn!("no input signal detected; still waiting for edges");
                        }
                    }
                }
            }
            RunState::StorageExhausted => {
                error!("storage exhausted; free up the SD card and reset the board");
                core::future::pending::<()>().await;
            }
        }
    }
}
