//! The three PIO sequencers of the reciprocal counting engine.
//!
//! All three state machines run on PIO0 at divider 1, so one sequencer cycle
//! is one reference-clock cycle. The gate machine defines the measurement
//! window on its side-set pin; the two counter machines watch that pin and
//! count down independently while it is low. Handshakes between the machines
//! use PIO IRQ flags only:
//!
//! - flag 0: gate → host, "window closed" (routed to `PIO0_IRQ_0`)
//! - flag 4: clock counter → gate, "result pushed"
//! - flag 5: pulse counter → gate, "result pushed"
//!
//! The gate reloads its window length through a blocking `pull` before every
//! window, so the next window cannot open until the host pushes a fresh
//! gate-time value. The host only does that after both results have been
//! drained and the counters re-enabled, which makes one-window-at-a-time a
//! hardware guarantee.
//!
//! The pulse counter raises its "done" side-set pin when it latches, and the
//! clock counter keeps counting until that pin rises, so both window
//! boundaries land exactly on input-signal edges. That alignment is what
//! makes the measurement reciprocal.

use embassy_rp::gpio::{Level, Pull};
use embassy_rp::pio::{Common, Config, Direction, Instance, Irq, Pin, StateMachine};
use freq_core::config::{GATE_STARTUP_CYCLES, GATE_WINDOW_CYCLES};
use freq_core::convert::MAX_COUNT;
use freq_core::RawSample;

/// Driver for the gate and the two counters, plus the window-closed IRQ.
pub struct ReciprocalCounter<'d, P: Instance> {
    gate: StateMachine<'d, P, 0>,
    clock: StateMachine<'d, P, 1>,
    pulse: StateMachine<'d, P, 2>,
    window_irq: Irq<'d, P, 0>,
    gate_cfg: Config<'d, P>,
    clock_cfg: Config<'d, P>,
    pulse_cfg: Config<'d, P>,
    _input: Pin<'d, P>,
    _gate_pin: Pin<'d, P>,
    _done_pin: Pin<'d, P>,
}

impl<'d, P: Instance> ReciprocalCounter<'d, P> {
    /// Load the three programs and configure the state machines.
    ///
    /// `gate_pin` must be the GPIO directly below `input` — the pulse
    /// counter reads both through one two-pin input window.
    pub fn new(
        common: &mut Common<'d, P>,
        window_irq: Irq<'d, P, 0>,
        mut gate: StateMachine<'d, P, 0>,
        mut clock: StateMachine<'d, P, 1>,
        mut pulse: StateMachine<'d, P, 2>,
        mut input: Pin<'d, P>,
        gate_pin: Pin<'d, P>,
        done_pin: Pin<'d, P>,
    ) -> Self {
        input.set_pull(Pull::Up);

        // Gate: window length arrives through TX before every window; the
        // window closes on an input rising edge, then the host and both
        // counters are waited on before the next pull.
        let gate_prg = pio_proc::pio_asm!(
            ".side_set 1 opt",
            ".wrap_target",
            "pull block       side 1", // hold gate high until the host arms a window
            "mov x, osr",
            "wait 0 pin 0",
            "wait 1 pin 0", // clean rising-edge reference before opening
            "window:",
            "jmp x-- window   side 0", // gate low for the armed cycle count
            "wait 0 pin 0",
            "wait 1 pin 0     side 1", // close the window on an input rising edge
            "irq wait 0",              // announce the closed window to the host
            "wait 1 irq 4",            // clock counter has latched
            "wait 1 irq 5",            // pulse counter has latched
            ".wrap",
        );

        // Clock counter: two cycles per decrement (branch + decrement), the
        // origin of the factor of two in the conversion. Stops when the
        // pulse counter raises the done pin, aligning the counted interval
        // to the closing input edge.
        let clock_prg = pio_proc::pio_asm!(
            "pull block", // countdown seed, loaded once per session
            ".wrap_target",
            "mov x, osr",
            "wait 1 pin 0", // gate idle
            "wait 0 pin 0", // window opens
            "count:",
            "jmp pin latched", // done pin high: window over
            "jmp x-- count",
            "latched:",
            "mov isr, x",
            "push block",
            "irq wait 4",
            ".wrap",
        );

        // Pulse counter: one decrement per input rising edge. Checks the
        // gate after each edge and raises the done pin when it latches.
        let pulse_prg = pio_proc::pio_asm!(
            ".side_set 1 opt",
            "pull block", // countdown seed, loaded once per session
            ".wrap_target",
            "mov x, osr",
            "wait 1 pin 0",
            "wait 0 pin 0     side 0", // window opens; drop the done line
            "edge:",
            "wait 0 pin 1",
            "wait 1 pin 1", // input rising edge
            "jmp pin latched", // gate back high: window over
            "jmp x-- edge",
            "latched:",
            "mov isr, x       side 1", // raise done so the clock counter stops
            "push block",
            "irq wait 5",
            ".wrap",
        );

        let mut gate_cfg = Config::default();
        gate_cfg.use_program(&common.load_program(&gate_prg.program), &[&gate_pin]);
        gate_cfg.set_in_pins(&[&input]);

        let mut clock_cfg = Config::default();
        clock_cfg.use_program(&common.load_program(&clock_prg.program), &[]);
        clock_cfg.set_in_pins(&[&gate_pin]);
        clock_cfg.set_jmp_pin(&done_pin);

        let mut pulse_cfg = Config::default();
        pulse_cfg.use_program(&common.load_program(&pulse_prg.program), &[&done_pin]);
        pulse_cfg.set_in_pins(&[&gate_pin, &input]);
        pulse_cfg.set_jmp_pin(&gate_pin);

        gate.set_config(&gate_cfg);
        clock.set_config(&clock_cfg);
        pulse.set_config(&pulse_cfg);

        // Both handshake lines idle high.
        gate.set_pins(Level::High, &[&gate_pin]);
        gate.set_pin_dirs(Direction::Out, &[&gate_pin]);
        pulse.set_pins(Level::High, &[&done_pin]);
        pulse.set_pin_dirs(Direction::Out, &[&done_pin]);
        gate.set_pin_dirs(Direction::In, &[&input]);

        Self {
            gate,
            clock,
            pulse,
            window_irq,
            gate_cfg,
            clock_cfg,
            pulse_cfg,
            _input: input,
            _gate_pin: gate_pin,
            _done_pin: done_pin,
        }
    }

    /// Full restart for a new run session.
    ///
    /// Clears any half-counted window and stale FIFO contents from a
    /// previous session, re-seeds both counters, and arms the long settling
    /// window. The gate's first `pull` re-raises the gate line by side-set
    /// even before a window is armed.
    pub async fn start_session(&mut self) {
        self.shutdown();
        self.gate.clear_fifos();
        self.clock.clear_fifos();
        self.pulse.clear_fifos();
        self.gate.restart();
        self.clock.restart();
        self.pulse.restart();
        // Re-applying the config points each machine back at its program
        // entry.
        self.gate.set_config(&self.gate_cfg);
        self.clock.set_config(&self.clock_cfg);
        self.pulse.set_config(&self.pulse_cfg);

        self.clock.set_enable(true);
        self.pulse.set_enable(true);
        self.gate.set_enable(true);

        // Countdown seeds, consumed once by each counter's entry pull. The
        // pulse counter is seeded one lower; its conversion has no terminal
        // tick to correct for.
        self.clock.tx().wait_push(MAX_COUNT).await;
        self.pulse.tx().wait_push(MAX_COUNT - 1).await;
        self.gate.tx().wait_push(GATE_STARTUP_CYCLES).await;
    }

    /// Resolves when the gate raises the window-closed interrupt.
    pub async fn window_closed(&mut self) {
        self.window_irq.wait().await;
    }

    /// Collect both latched results for the closed window.
    ///
    /// The counters push in their own time shortly after the gate rises (the
    /// pulse counter needs one more input edge to notice the closed gate),
    /// so this can outwait a vanished input signal; the engine keeps
    /// commands serviced while it does.
    pub async fn drain(&mut self) -> RawSample {
        let clock_ticks = self.clock.rx().wait_pull().await;
        let edge_ticks = self.pulse.rx().wait_pull().await;
        RawSample {
            clock_ticks,
            edge_ticks,
        }
    }

    /// Halt both counters. Called once their results are drained; they stay
    /// frozen until [`Self::arm_next_window`].
    pub fn freeze(&mut self) {
        self.clock.set_enable(false);
        self.pulse.set_enable(false);
    }

    /// Re-enable the counters, then let the gate open the next window.
    ///
    /// Order matters: the counters must be watching the gate line before the
    /// gate's pull completes, or the window would go uncounted.
    pub async fn arm_next_window(&mut self) {
        self.clock.set_enable(true);
        self.pulse.set_enable(true);
        self.gate.tx().wait_push(GATE_WINDOW_CYCLES).await;
    }

    /// Disable all three state machines. A window mid-count is simply
    /// abandoned; [`Self::start_session`] clears its leftovers.
    pub fn shutdown(&mut self) {
        self.gate.set_enable(false);
        self.clock.set_enable(false);
        self.pulse.set_enable(false);
    }
}
