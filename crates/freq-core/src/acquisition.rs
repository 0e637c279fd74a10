//! Acquisition state machine.
//!
//! The firmware's main task owns the clock: it feeds button presses, drained
//! samples, and idle ticks into [`Acquisition`] with millisecond timestamps
//! and carries out the returned [`Control`] by commanding the counter
//! engine. Keeping the machine free of peripherals and real time lets the
//! host test suite drive every transition directly.

use log::debug;

use crate::config::{
    BUTTON_DEBOUNCE_MS, CAPACITY_CHECK_INTERVAL, CAPACITY_MIN_FREE, IDLE_TICKS_PER_ADVISORY,
};
use crate::convert::RawSample;
use crate::record::Measurement;

/// Run/stop lifecycle of the measurement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Powered up, waiting for the first button press.
    AwaitingStart,
    /// A session is open and the sequencers are counting.
    Running,
    /// Stopped by the button; a press opens a fresh session.
    Stopped,
    /// Free space fell below the floor. Terminal until the operator frees
    /// space and resets the board.
    StorageExhausted,
}

/// Sequencer command the caller must deliver to the counter engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Reset and start all three sequencers for a new session.
    Start,
    /// Re-enable the counters and arm the next window.
    Resume,
    /// Disable all three sequencers.
    Halt,
}

/// Outcome of feeding one drained sample into the machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// The sample was converted and appended to the session log.
    Recorded {
        measurement: Measurement,
        control: Control,
    },
    /// The sample belonged to a superseded window (loop no longer running).
    Ignored,
}

/// Where measurement records go. One session per run; rows are append-only.
pub trait LogSink {
    type Error;

    /// Open a fresh session log (new file, header written, nothing appended).
    fn start_session(&mut self, now_ms: u64) -> Result<(), Self::Error>;

    /// Append one record to the active session.
    fn append(&mut self, record: &Measurement) -> Result<(), Self::Error>;
}

/// External capacity collaborator, consumed only through this interface.
pub trait CapacityProbe {
    /// Fraction of free storage in `[0, 1]`.
    fn free_fraction(&mut self) -> f32;
}

/// Minimum-interval debounce for the run/stop button.
///
/// The first transition is always accepted; later ones only once
/// [`BUTTON_DEBOUNCE_MS`] has elapsed since the last accepted press.
#[derive(Debug, Default)]
pub struct Debouncer {
    last_accepted_ms: Option<u64>,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            last_accepted_ms: None,
        }
    }

    pub fn accept(&mut self, now_ms: u64) -> bool {
        let ok = match self.last_accepted_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= BUTTON_DEBOUNCE_MS,
        };
        if ok {
            self.last_accepted_ms = Some(now_ms);
        }
        ok
    }
}

/// The acquisition loop proper, parameterized over the storage collaborator.
pub struct Acquisition<S> {
    state: RunState,
    sample_index: u32,
    debounce: Debouncer,
    idle_ticks: u32,
    storage: S,
}

impl<S> Acquisition<S>
where
    S: LogSink + CapacityProbe,
{
    pub fn new(storage: S) -> Self {
        Self {
            state: RunState::AwaitingStart,
            sample_index: 0,
            debounce: Debouncer::new(),
            idle_ticks: 0,
            storage,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Access the storage collaborator, e.g. for a boot-time capacity report.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Feed a candidate button transition.
    ///
    /// Bounces inside the minimum interval are absorbed here and produce no
    /// state change. On a session start the sink is opened before the
    /// sequencers are told to run; if that fails the machine stays stopped
    /// and the error propagates for reporting.
    pub fn press_button(&mut self, now_ms: u64) -> Result<Option<Control>, S::Error> {
        if !self.debounce.accept(now_ms) {
            return Ok(None);
        }
        match self.state {
            RunState::AwaitingStart | RunState::Stopped => {
                self.storage.start_session(now_ms)?;
                self.sample_index = 0;
                self.idle_ticks = 0;
                self.state = RunState::Running;
                Ok(Some(Control::Start))
            }
            RunState::Running => {
                self.state = RunState::Stopped;
                Ok(Some(Control::Halt))
            }
            RunState::StorageExhausted => Ok(None),
        }
    }

    /// Feed one drained raw sample.
    ///
    /// Converts, appends, and decides whether the counters may open another
    /// window. Every [`CAPACITY_CHECK_INTERVAL`] records the capacity
    /// collaborator is probed; dropping under the floor is the terminal
    /// storage-exhausted transition. An append failure stops the session
    /// rather than crashing the loop.
    pub fn handle_sample(
        &mut self,
        raw: RawSample,
        now_ms: u64,
    ) -> Result<SampleOutcome, S::Error> {
        if self.state != RunState::Running {
            // A window that closed while we were stopping; its session is
            // gone, so the sample is dropped.
            debug!("ignoring sample from a superseded window");
            return Ok(SampleOutcome::Ignored);
        }
        self.idle_ticks = 0;

        let measurement = Measurement::from_raw(raw, self.sample_index, now_ms);
        if let Err(e) = self.storage.append(&measurement) {
            self.state = RunState::Stopped;
            return Err(e);
        }
        self.sample_index += 1;

        let control = if self.sample_index % CAPACITY_CHECK_INTERVAL == 0
            && self.storage.free_fraction() < CAPACITY_MIN_FREE
        {
            self.state = RunState::StorageExhausted;
            Control::Halt
        } else {
            Control::Resume
        };
        Ok(SampleOutcome::Recorded {
            measurement,
            control,
        })
    }

    /// Register one idle poll with no sample; true when the "no signal"
    /// advisory is due.
    pub fn idle_tick(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        self.idle_ticks += 1;
        self.idle_ticks % IDLE_TICKS_PER_ADVISORY == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::MAX_COUNT;

    /// Storage double: records sessions and rows, reports a scripted
    /// free fraction.
    struct MockStorage {
        sessions: Vec<Vec<Measurement>>,
        free: f32,
        fail_start: bool,
        fail_append: bool,
        probes: u32,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                sessions: Vec::new(),
                free: 0.5,
                fail_start: false,
                fail_append: false,
                probes: 0,
            }
        }
    }

    impl LogSink for MockStorage {
        type Error = &'static str;

        fn start_session(&mut self, _now_ms: u64) -> Result<(), Self::Error> {
            if self.fail_start {
                return Err("no card");
            }
            self.sessions.push(Vec::new());
            Ok(())
        }

        fn append(&mut self, record: &Measurement) -> Result<(), Self::Error> {
            if self.fail_append {
                return Err("write failed");
            }
            self.sessions.last_mut().expect("no session").push(*record);
            Ok(())
        }
    }

    impl CapacityProbe for MockStorage {
        fn free_fraction(&mut self) -> f32 {
            self.probes += 1;
            self.free
        }
    }

    fn raw() -> RawSample {
        RawSample {
            clock_ticks: MAX_COUNT - 62_499_999,
            edge_ticks: MAX_COUNT - 1000,
        }
    }

    fn running(acq: &mut Acquisition<MockStorage>) {
        assert_eq!(acq.press_button(0).unwrap(), Some(Control::Start));
        assert_eq!(acq.state(), RunState::Running);
    }

    #[test]
    fn run_stop_run_opens_fresh_sessions_with_reset_indices() {
        let mut acq = Acquisition::new(MockStorage::new());
        assert_eq!(acq.state(), RunState::AwaitingStart);

        running(&mut acq);
        for i in 0..3 {
            match acq.handle_sample(raw(), 10 + i).unwrap() {
                SampleOutcome::Recorded { measurement, control } => {
                    assert_eq!(measurement.index, i as u32);
                    assert_eq!(control, Control::Resume);
                }
                SampleOutcome::Ignored => panic!("sample dropped while running"),
            }
        }

        assert_eq!(acq.press_button(2000).unwrap(), Some(Control::Halt));
        assert_eq!(acq.state(), RunState::Stopped);

        assert_eq!(acq.press_button(4000).unwrap(), Some(Control::Start));
        match acq.handle_sample(raw(), 4100).unwrap() {
            SampleOutcome::Recorded { measurement, .. } => assert_eq!(measurement.index, 0),
            SampleOutcome::Ignored => panic!("sample dropped in new session"),
        }

        let storage = acq.storage_mut();
        assert_eq!(storage.sessions.len(), 2);
        assert_eq!(storage.sessions[0].len(), 3);
        assert_eq!(storage.sessions[1].len(), 1);
    }

    #[test]
    fn consecutive_samples_get_strictly_increasing_indices() {
        let mut acq = Acquisition::new(MockStorage::new());
        running(&mut acq);
        for i in 0..100u32 {
            match acq.handle_sample(raw(), i as u64).unwrap() {
                SampleOutcome::Recorded { measurement, .. } => {
                    assert_eq!(measurement.index, i);
                }
                SampleOutcome::Ignored => panic!("sample dropped"),
            }
        }
        assert_eq!(acq.storage_mut().sessions[0].len(), 100);
    }

    #[test]
    fn debounce_absorbs_close_transitions_and_passes_spaced_ones() {
        let mut acq = Acquisition::new(MockStorage::new());
        running(&mut acq); // accepted at t=0
        // 400 ms later: bounce, no state change.
        assert_eq!(acq.press_button(400).unwrap(), None);
        assert_eq!(acq.state(), RunState::Running);
        // 1200 ms after the accepted press: a real stop.
        assert_eq!(acq.press_button(1200).unwrap(), Some(Control::Halt));
        assert_eq!(acq.state(), RunState::Stopped);
    }

    #[test]
    fn capacity_is_probed_every_256th_record_and_halts_under_the_floor() {
        let mut acq = Acquisition::new(MockStorage::new());
        acq.storage_mut().free = 0.09;
        running(&mut acq);

        for i in 0..255u32 {
            match acq.handle_sample(raw(), i as u64).unwrap() {
                SampleOutcome::Recorded { control, .. } => assert_eq!(control, Control::Resume),
                SampleOutcome::Ignored => panic!("sample dropped"),
            }
        }
        // No probe until the 256th record lands.
        assert_eq!(acq.storage_mut().probes, 0);

        match acq.handle_sample(raw(), 255).unwrap() {
            SampleOutcome::Recorded { control, .. } => assert_eq!(control, Control::Halt),
            SampleOutcome::Ignored => panic!("sample dropped"),
        }
        assert_eq!(acq.storage_mut().probes, 1);
        assert_eq!(acq.state(), RunState::StorageExhausted);

        // Terminal: neither samples nor presses revive the loop.
        assert_eq!(acq.handle_sample(raw(), 9000).unwrap(), SampleOutcome::Ignored);
        assert_eq!(acq.press_button(9000).unwrap(), None);
    }

    #[test]
    fn samples_from_a_stopped_session_are_ignored() {
        let mut acq = Acquisition::new(MockStorage::new());
        running(&mut acq);
        acq.press_button(2000).unwrap();
        // The window that was mid-count when the stop landed.
        assert_eq!(acq.handle_sample(raw(), 2100).unwrap(), SampleOutcome::Ignored);
        assert!(acq.storage_mut().sessions[0].is_empty());
    }

    #[test]
    fn failed_session_open_stays_stopped() {
        let mut storage = MockStorage::new();
        storage.fail_start = true;
        let mut acq = Acquisition::new(storage);
        assert!(acq.press_button(0).is_err());
        assert_eq!(acq.state(), RunState::AwaitingStart);
    }

    #[test]
    fn append_failure_stops_the_session_without_panicking() {
        let mut acq = Acquisition::new(MockStorage::new());
        running(&mut acq);
        acq.storage_mut().fail_append = true;
        assert!(acq.handle_sample(raw(), 100).is_err());
        assert_eq!(acq.state(), RunState::Stopped);
        // A later press opens a fresh session again.
        acq.storage_mut().fail_append = false;
        assert_eq!(acq.press_button(3000).unwrap(), Some(Control::Start));
    }

    #[test]
    fn advisory_fires_on_the_idle_cadence_and_resets_on_data() {
        let mut acq = Acquisition::new(MockStorage::new());
        // Not running: never due.
        assert!(!acq.idle_tick());
        running(&mut acq);
        let due: Vec<bool> = (0..4).map(|_| acq.idle_tick()).collect();
        assert_eq!(due, vec![false, false, false, true]);
        // A sample clears the idle streak.
        acq.handle_sample(raw(), 50).unwrap();
        assert!(!acq.idle_tick());
    }
}
