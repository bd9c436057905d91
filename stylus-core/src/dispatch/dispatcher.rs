//! Paced command streamer
//!
//! Row `i` is written at `start + i * tick`, where `start` is the moment the
//! enable bit was observed. Late rows are still written, never skipped, and
//! counted as overruns. Any link failure ends the run with a single
//! best-effort pen-up write.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use libm::round;
use log::{debug, error, info, trace, warn};
use stylus_hal::{Clock, RegisterLink};

use super::events::DispatchEvent;
use super::machine::{DispatchState, FaultKind};
use crate::command::CommandTable;
use crate::config::HandshakeConfig;

/// Values in the controller's position block
pub const POSITION_BLOCK_LEN: usize = 4;

/// Rows between progress log lines
const PROGRESS_INTERVAL: usize = 250;

/// Longest sleep between cancel checks while waiting for enable
const CANCEL_SLICE_MS: u32 = 10;

/// Controller-facing handshake bits as last written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandshakeState {
    /// Enable bit has been observed high
    pub enabled: bool,
    /// Pen/trigger bit is currently asserted
    pub trigger_asserted: bool,
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchReport {
    pub rows_sent: usize,
    /// Rows written a full tick or more after their deadline
    pub overruns: usize,
    /// Pen bit writes during streaming
    pub pen_toggles: usize,
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind<E> {
    /// Link error
    Transport(E),
    /// Enable bit stayed low for the configured timeout
    HandshakeTimeout { waited_ms: u64 },
    /// Cancellation flag raised
    Cancelled,
}

impl<E> FailureKind<E> {
    /// State machine fault for this failure
    pub fn fault(&self) -> FaultKind {
        match self {
            Self::Transport(_) => FaultKind::Transport,
            Self::HandshakeTimeout { .. } => FaultKind::HandshakeTimeout,
            Self::Cancelled => FaultKind::Cancelled,
        }
    }
}

/// Failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure<E> {
    /// State the dispatcher was in when the failure occurred
    pub state: DispatchState,
    /// Row being written, if the failure happened while streaming
    pub row: Option<usize>,
    pub kind: FailureKind<E>,
    /// Whether the pen-up write after the failure succeeded
    pub safe_state_written: bool,
}

impl<E: fmt::Debug> fmt::Display for DispatchFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::Transport(e) => write!(f, "link failure: {:?}", e)?,
            FailureKind::HandshakeTimeout { waited_ms } => {
                write!(f, "enable bit not raised after {} ms", waited_ms)?
            }
            FailureKind::Cancelled => write!(f, "cancelled")?,
        }
        match self.row {
            Some(row) => write!(f, " at row {}", row),
            None => write!(f, " in {:?}", self.state),
        }
    }
}

/// Position block read back from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JointFeedback {
    pub j1_pos: i64,
    pub j1_hz: i64,
    pub j2_pos: i64,
    pub j2_hz: i64,
}

/// Read the position block back from the controller
pub fn read_feedback<L: RegisterLink>(
    link: &mut L,
    config: &HandshakeConfig,
) -> Result<JointFeedback, L::Error> {
    let mut values = [0i64; POSITION_BLOCK_LEN];
    link.read_registers(&config.position_register, &mut values)?;
    Ok(JointFeedback {
        j1_pos: values[0],
        j1_hz: values[1],
        j2_pos: values[2],
        j2_hz: values[3],
    })
}

/// Streams a [`CommandTable`] to the controller
pub struct Dispatcher {
    config: HandshakeConfig,
    state: DispatchState,
    handshake: HandshakeState,
}

impl Dispatcher {
    pub fn new(config: HandshakeConfig) -> Self {
        Self {
            config,
            state: DispatchState::Idle,
            handshake: HandshakeState::default(),
        }
    }

    /// Get the current state
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Get the handshake bits as last written
    pub fn handshake(&self) -> HandshakeState {
        self.handshake
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    fn apply(&mut self, event: DispatchEvent) {
        let next = self.state.transition(event);
        if next != self.state {
            debug!("Dispatch {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    /// Run one dispatch: wait for enable, stream every row, lift the pen
    ///
    /// Each call is an independent run starting from [`DispatchState::Idle`].
    /// `cancel` is checked at least every 10 ms while waiting for enable and
    /// once per row while streaming.
    pub fn run<L, C>(
        &mut self,
        link: &mut L,
        clock: &mut C,
        table: &CommandTable,
        cancel: &AtomicBool,
    ) -> Result<DispatchReport, DispatchFailure<L::Error>>
    where
        L: RegisterLink,
        C: Clock,
    {
        self.state = DispatchState::Idle;
        self.handshake = HandshakeState::default();
        self.apply(DispatchEvent::Start);

        info!("Waiting for enable bit {}", self.config.enable_bit.as_str());
        if let Err(kind) = self.wait_enable(link, clock, cancel) {
            return Err(self.abort(link, kind, None));
        }
        self.handshake.enabled = true;
        self.apply(DispatchEvent::EnableObserved);
        info!(
            "Enable observed, streaming {} rows ({:.2} s)",
            table.len(),
            table.duration_s()
        );

        let mut report = DispatchReport::default();
        if let Err((row, kind)) = self.stream(link, clock, table, cancel, &mut report) {
            return Err(self.abort(link, kind, Some(row)));
        }
        self.apply(DispatchEvent::RowsExhausted);

        // Draining: lift the pen. No safe-state retry if this write fails
        if let Err(e) = link.write_bit(&self.config.pen_bit, false) {
            error!("Final pen-up write failed: {:?}", e);
            let failed_in = self.state;
            self.apply(DispatchEvent::Fault(FaultKind::Transport));
            return Err(DispatchFailure {
                state: failed_in,
                row: None,
                kind: FailureKind::Transport(e),
                safe_state_written: false,
            });
        }
        self.handshake.trigger_asserted = false;
        self.apply(DispatchEvent::SafeStateWritten);

        if report.overruns > 0 {
            warn!("{} rows missed their tick", report.overruns);
        }
        info!(
            "Dispatch complete: {} rows, {} pen toggles",
            report.rows_sent, report.pen_toggles
        );
        Ok(report)
    }

    fn wait_enable<L, C>(
        &mut self,
        link: &mut L,
        clock: &mut C,
        cancel: &AtomicBool,
    ) -> Result<(), FailureKind<L::Error>>
    where
        L: RegisterLink,
        C: Clock,
    {
        let started = clock.now_us();
        let timeout_us = self.config.enable_timeout_ms.map(|ms| ms as u64 * 1000);

        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(FailureKind::Cancelled);
            }
            if link
                .read_bit(&self.config.enable_bit)
                .map_err(FailureKind::Transport)?
            {
                return Ok(());
            }

            let waited = clock.now_us().saturating_sub(started);
            if let Some(limit) = timeout_us {
                if waited >= limit {
                    return Err(FailureKind::HandshakeTimeout {
                        waited_ms: waited / 1000,
                    });
                }
            }
            trace!("Enable bit low after {} ms", waited / 1000);

            let mut remaining = self.config.poll_interval_ms;
            while remaining > 0 {
                if cancel.load(Ordering::Acquire) {
                    return Err(FailureKind::Cancelled);
                }
                let slice = remaining.min(CANCEL_SLICE_MS);
                clock.delay_ms(slice);
                remaining -= slice;
            }
        }
    }

    fn stream<L, C>(
        &mut self,
        link: &mut L,
        clock: &mut C,
        table: &CommandTable,
        cancel: &AtomicBool,
        report: &mut DispatchReport,
    ) -> Result<(), (usize, FailureKind<L::Error>)>
    where
        L: RegisterLink,
        C: Clock,
    {
        if !self.state.streaming_allowed() {
            warn!("Refusing to stream rows in {:?}", self.state);
            return Ok(());
        }

        let tick_us = round(table.tick_s() * 1_000_000.0) as u64;
        let start = clock.now_us();

        for (index, row) in table.iter().enumerate() {
            if cancel.load(Ordering::Acquire) {
                return Err((index, FailureKind::Cancelled));
            }

            let deadline = start + index as u64 * tick_us;
            let now = clock.now_us();
            if now >= deadline + tick_us {
                report.overruns += 1;
                trace!("Row {} late by {} us", index, now - deadline);
            }
            clock.sleep_until(deadline);

            link.write_registers(&self.config.position_register, &row.position_block())
                .map_err(|e| (index, FailureKind::Transport(e)))?;

            let pen_down = row.pen.is_down();
            if pen_down != self.handshake.trigger_asserted {
                link.write_bit(&self.config.pen_bit, pen_down)
                    .map_err(|e| (index, FailureKind::Transport(e)))?;
                self.handshake.trigger_asserted = pen_down;
                report.pen_toggles += 1;
            }

            report.rows_sent += 1;
            if index % PROGRESS_INTERVAL == 0 {
                debug!("Row {}/{}", index, table.len());
            }
        }
        Ok(())
    }

    /// Best-effort pen-up, then move to `Aborted`
    fn abort<L: RegisterLink>(
        &mut self,
        link: &mut L,
        kind: FailureKind<L::Error>,
        row: Option<usize>,
    ) -> DispatchFailure<L::Error> {
        let failed_in = self.state;
        let safe_state_written = if failed_in.is_terminal() {
            false
        } else {
            match link.write_bit(&self.config.pen_bit, false) {
                Ok(()) => {
                    self.handshake.trigger_asserted = false;
                    true
                }
                Err(e) => {
                    warn!("Pen-up after failure also failed: {:?}", e);
                    false
                }
            }
        };
        self.apply(DispatchEvent::Fault(kind.fault()));

        let failure = DispatchFailure {
            state: failed_in,
            row,
            kind,
            safe_state_written,
        };
        error!("Dispatch aborted: {}", failure);
        failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MotorCommand;
    use crate::motion::PenState;
    use core::cell::Cell;
    use embedded_hal::delay::DelayNs;
    use std::sync::Arc;

    /// Simulated clock; optionally advances on every read
    struct FakeClock {
        now_ns: Cell<u64>,
        per_read_ns: u64,
        /// Raise the flag once a delay carries time past this many us
        cancel_at: Option<(u64, Arc<AtomicBool>)>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now_ns: Cell::new(0),
                per_read_ns: 0,
                cancel_at: None,
            }
        }

        fn slow(per_read_us: u64) -> Self {
            Self {
                per_read_ns: per_read_us * 1000,
                ..Self::new()
            }
        }
    }

    impl DelayNs for FakeClock {
        fn delay_ns(&mut self, ns: u32) {
            let now = self.now_ns.get() + ns as u64;
            self.now_ns.set(now);
            if let Some((at_us, flag)) = &self.cancel_at {
                if now >= at_us * 1000 {
                    flag.store(true, Ordering::Release);
                }
            }
        }
    }

    impl Clock for FakeClock {
        fn now_us(&self) -> u64 {
            let t = self.now_ns.get();
            self.now_ns.set(t + self.per_read_ns);
            t / 1000
        }
    }

    /// Scripted controller
    #[derive(Default)]
    struct FakeLink {
        /// Enable bit reads high from this poll on (`None` never)
        enable_at_poll: Option<usize>,
        polls: usize,
        register_attempts: usize,
        register_writes: Vec<(String, Vec<i64>)>,
        bit_writes: Vec<(String, bool)>,
        fail_register_write_at: Option<usize>,
        fail_bit_writes: bool,
        cancel_after_rows: Option<(usize, Arc<AtomicBool>)>,
        feedback: [i64; 4],
    }

    impl FakeLink {
        fn enabled() -> Self {
            Self {
                enable_at_poll: Some(0),
                ..Self::default()
            }
        }
    }

    impl RegisterLink for FakeLink {
        type Error = &'static str;

        fn read_bit(&mut self, _device: &str) -> Result<bool, Self::Error> {
            let poll = self.polls;
            self.polls += 1;
            Ok(self.enable_at_poll.is_some_and(|at| poll >= at))
        }

        fn write_bit(&mut self, device: &str, value: bool) -> Result<(), Self::Error> {
            self.bit_writes.push((device.to_string(), value));
            if self.fail_bit_writes {
                return Err("bit write refused");
            }
            Ok(())
        }

        fn read_registers(&mut self, _device: &str, out: &mut [i64]) -> Result<(), Self::Error> {
            out.copy_from_slice(&self.feedback[..out.len()]);
            Ok(())
        }

        fn write_registers(&mut self, device: &str, values: &[i64]) -> Result<(), Self::Error> {
            let attempt = self.register_attempts;
            self.register_attempts += 1;
            if self.fail_register_write_at == Some(attempt) {
                return Err("connection reset");
            }
            self.register_writes.push((device.to_string(), values.to_vec()));
            if let Some((after, flag)) = &self.cancel_after_rows {
                if self.register_writes.len() >= *after {
                    flag.store(true, Ordering::Release);
                }
            }
            Ok(())
        }
    }

    fn table(pens: &[PenState]) -> CommandTable {
        let rows = pens
            .iter()
            .enumerate()
            .map(|(i, &pen)| MotorCommand {
                t: i as f64 * 0.02,
                j1_pos: i as i64,
                j1_dir: true,
                j1_delta: 1,
                j1_hz: 50.0,
                j2_pos: -(i as i64),
                j2_dir: false,
                j2_delta: 1,
                j2_hz: 50.7,
                pen,
            })
            .collect();
        CommandTable::from_rows(0.02, rows, 0, 0)
    }

    fn pen_up_table(n: usize) -> CommandTable {
        table(&vec![PenState::Up; n])
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(HandshakeConfig::default())
    }

    #[test]
    fn test_streams_every_row() {
        let mut link = FakeLink::enabled();
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(false);
        let mut d = dispatcher();

        let report = d
            .run(&mut link, &mut clock, &pen_up_table(10), &cancel)
            .unwrap();

        assert_eq!(report.rows_sent, 10);
        assert_eq!(report.overruns, 0);
        assert_eq!(d.state(), DispatchState::Done);
        assert_eq!(link.register_writes.len(), 10);
        assert_eq!(link.register_writes[3], ("D100".to_string(), vec![3, 50, -3, 50]));
        // Only the final pen-up
        assert_eq!(link.bit_writes, vec![("M4".to_string(), false)]);
        assert!(d.handshake().enabled);
        assert!(!d.handshake().trigger_asserted);
    }

    #[test]
    fn test_rows_paced_on_tick() {
        let mut link = FakeLink::enabled();
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(false);

        dispatcher()
            .run(&mut link, &mut clock, &pen_up_table(10), &cancel)
            .unwrap();

        // Last row waits for its deadline at 9 ticks
        assert_eq!(clock.now_us(), 9 * 20_000);
    }

    #[test]
    fn test_pen_bit_written_only_on_change() {
        use PenState::{Down, Up};
        let mut link = FakeLink::enabled();
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(false);

        let report = dispatcher()
            .run(&mut link, &mut clock, &table(&[Up, Up, Down, Down, Down, Up]), &cancel)
            .unwrap();

        assert_eq!(report.pen_toggles, 2);
        let values: Vec<bool> = link.bit_writes.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![true, false, false]);
    }

    #[test]
    fn test_transport_failure_mid_stream() {
        let mut link = FakeLink {
            fail_register_write_at: Some(50),
            ..FakeLink::enabled()
        };
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(false);
        let mut d = dispatcher();

        let failure = d
            .run(&mut link, &mut clock, &pen_up_table(1000), &cancel)
            .unwrap_err();

        assert_eq!(failure.row, Some(50));
        assert_eq!(failure.kind, FailureKind::Transport("connection reset"));
        assert_eq!(failure.state, DispatchState::Streaming);
        assert!(failure.safe_state_written);
        assert_eq!(d.state(), DispatchState::Aborted(FaultKind::Transport));

        // Rows 51.. never attempted, exactly one safe-state write
        assert_eq!(link.register_attempts, 51);
        assert_eq!(link.register_writes.len(), 50);
        assert_eq!(link.bit_writes, vec![("M4".to_string(), false)]);
    }

    #[test]
    fn test_handshake_timeout() {
        let mut link = FakeLink::default();
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(false);
        let mut d = Dispatcher::new(HandshakeConfig {
            enable_timeout_ms: Some(1000),
            ..HandshakeConfig::default()
        });

        let failure = d
            .run(&mut link, &mut clock, &pen_up_table(5), &cancel)
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::HandshakeTimeout { waited_ms: 1000 });
        assert_eq!(failure.state, DispatchState::WaitEnable);
        assert_eq!(failure.row, None);
        assert_eq!(d.state(), DispatchState::Aborted(FaultKind::HandshakeTimeout));
        assert_eq!(link.polls, 11);
        assert!(link.register_writes.is_empty());
        assert_eq!(link.bit_writes.len(), 1);
    }

    #[test]
    fn test_waits_for_late_enable() {
        let mut link = FakeLink {
            enable_at_poll: Some(5),
            ..FakeLink::default()
        };
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(false);
        let mut d = Dispatcher::new(HandshakeConfig {
            enable_timeout_ms: None,
            ..HandshakeConfig::default()
        });

        let report = d
            .run(&mut link, &mut clock, &pen_up_table(3), &cancel)
            .unwrap();

        assert_eq!(report.rows_sent, 3);
        assert_eq!(link.polls, 6);
        // Five poll intervals, then two ticks of streaming
        assert_eq!(clock.now_us(), 500_000 + 40_000);
    }

    #[test]
    fn test_cancel_while_waiting() {
        let mut link = FakeLink::default();
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(true);
        let mut d = dispatcher();

        let failure = d
            .run(&mut link, &mut clock, &pen_up_table(3), &cancel)
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(link.polls, 0);
        assert_eq!(d.state(), DispatchState::Aborted(FaultKind::Cancelled));
    }

    #[test]
    fn test_cancel_during_poll_sleep() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut link = FakeLink::default();
        let mut clock = FakeClock {
            cancel_at: Some((25_000, flag.clone())),
            ..FakeClock::new()
        };
        let mut d = Dispatcher::new(HandshakeConfig {
            poll_interval_ms: 1000,
            enable_timeout_ms: None,
            ..HandshakeConfig::default()
        });

        let failure = d
            .run(&mut link, &mut clock, &pen_up_table(3), &flag)
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.state, DispatchState::WaitEnable);
        assert!(failure.safe_state_written);
        assert_eq!(link.polls, 1);
        // Noticed at the end of the third 10 ms slice, not after a full poll
        assert_eq!(clock.now_us(), 30_000);
    }

    #[test]
    fn test_cancel_mid_stream() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut link = FakeLink {
            cancel_after_rows: Some((3, flag.clone())),
            ..FakeLink::enabled()
        };
        let mut clock = FakeClock::new();
        let mut d = dispatcher();

        let failure = d
            .run(&mut link, &mut clock, &pen_up_table(20), &flag)
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.row, Some(3));
        assert_eq!(link.register_writes.len(), 3);
        assert_eq!(link.bit_writes, vec![("M4".to_string(), false)]);
    }

    #[test]
    fn test_no_rows_outside_streaming() {
        for state in [DispatchState::Idle, DispatchState::WaitEnable, DispatchState::Done] {
            let mut link = FakeLink::enabled();
            let mut clock = FakeClock::new();
            let cancel = AtomicBool::new(false);
            let mut report = DispatchReport::default();
            let mut d = dispatcher();
            d.state = state;

            d.stream(&mut link, &mut clock, &table(&[PenState::Down; 4]), &cancel, &mut report)
                .unwrap();

            assert_eq!(report, DispatchReport::default());
            assert_eq!(link.register_attempts, 0);
            assert!(link.bit_writes.is_empty());
        }
    }

    #[test]
    fn test_no_pen_write_after_run_ended() {
        for state in [DispatchState::Done, DispatchState::Aborted(FaultKind::Transport)] {
            let mut link = FakeLink::enabled();
            let mut d = dispatcher();
            d.state = state;

            let failure = d.abort(&mut link, FailureKind::Cancelled, None);

            assert!(!failure.safe_state_written);
            assert_eq!(failure.state, state);
            assert!(link.bit_writes.is_empty());
            assert_eq!(d.state(), state);
        }
    }

    #[test]
    fn test_overruns_counted_not_skipped() {
        let mut link = FakeLink::enabled();
        // Every clock read costs 30 ms, more than a tick
        let mut clock = FakeClock::slow(30_000);
        let cancel = AtomicBool::new(false);

        let report = dispatcher()
            .run(&mut link, &mut clock, &pen_up_table(10), &cancel)
            .unwrap();

        assert_eq!(report.rows_sent, 10);
        assert!(report.overruns > 0);
        assert_eq!(link.register_writes.len(), 10);
    }

    #[test]
    fn test_drain_failure_aborts_without_second_write() {
        let mut link = FakeLink {
            fail_bit_writes: true,
            ..FakeLink::enabled()
        };
        let mut clock = FakeClock::new();
        let cancel = AtomicBool::new(false);
        let mut d = dispatcher();

        let failure = d
            .run(&mut link, &mut clock, &pen_up_table(4), &cancel)
            .unwrap_err();

        assert_eq!(failure.state, DispatchState::Draining);
        assert_eq!(failure.row, None);
        assert!(!failure.safe_state_written);
        assert_eq!(d.state(), DispatchState::Aborted(FaultKind::Transport));
        assert_eq!(link.bit_writes.len(), 1);
    }

    #[test]
    fn test_run_again_starts_fresh() {
        let mut d = dispatcher();
        let cancel = AtomicBool::new(false);
        for _ in 0..2 {
            let mut link = FakeLink::enabled();
            let mut clock = FakeClock::new();
            let report = d
                .run(&mut link, &mut clock, &pen_up_table(2), &cancel)
                .unwrap();
            assert_eq!(report.rows_sent, 2);
            assert_eq!(d.state(), DispatchState::Done);
        }
    }

    #[test]
    fn test_read_feedback() {
        let mut link = FakeLink {
            feedback: [1200, 40, -800, 25],
            ..FakeLink::default()
        };
        let fb = read_feedback(&mut link, &HandshakeConfig::default()).unwrap();
        assert_eq!(
            fb,
            JointFeedback {
                j1_pos: 1200,
                j1_hz: 40,
                j2_pos: -800,
                j2_hz: 25
            }
        );
    }

    #[test]
    fn test_failure_display() {
        let failure: DispatchFailure<&str> = DispatchFailure {
            state: DispatchState::Streaming,
            row: Some(7),
            kind: FailureKind::Transport("timeout"),
            safe_state_written: true,
        };
        assert_eq!(failure.to_string(), "link failure: \"timeout\" at row 7");
    }
}
