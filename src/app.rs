//! The sampling loop: poll, bounded wait, diff, render, repeat.
//!
//! One cooperative control flow. The only suspension point is the bounded
//! wait on the input source; polling, parsing, diffing and rendering run
//! to completion within a cycle, and one cycle's poll never interleaves
//! with another's.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::delta;
use crate::input::{InputSource, Key};
use crate::model::{SortColumn, StatSnapshot};
use crate::parser::{self, ParseError};
use crate::render;
use crate::source::{SourceError, StatsSource};

/// Default refresh cadence in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 3;

/// Error type for a failed monitoring run.
#[derive(Debug)]
pub enum AppError {
    Source(SourceError),
    Parse(ParseError),
    Io(io::Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Source(e) => write!(f, "{}", e),
            AppError::Parse(e) => write!(f, "{}", e),
            AppError::Io(e) => write!(f, "display output: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<SourceError> for AppError {
    fn from(e: SourceError) -> Self {
        AppError::Source(e)
    }
}

impl From<ParseError> for AppError {
    fn from(e: ParseError) -> Self {
        AppError::Parse(e)
    }
}

impl From<io::Error> for AppError {
    fn from(e: io::Error) -> Self {
        AppError::Io(e)
    }
}

/// Outcome of interpreting one keypress.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// State updated (or key consumed with nothing to change).
    Applied,
    /// Key rejected; state unchanged, message shown to the user.
    Rejected(&'static str),
    /// Quit the monitor.
    Quit,
}

/// Mutable state owned by the sampling loop.
///
/// `previous` is `None` exactly while no baseline sample exists yet (the
/// INITIAL state); afterwards it always holds the last snapshot.
pub struct LoopState {
    pub refresh_interval_secs: u64,
    pub sort: SortColumn,
    pub previous: Option<StatSnapshot>,
}

impl LoopState {
    pub fn new(refresh_interval_secs: u64) -> Self {
        Self {
            refresh_interval_secs: refresh_interval_secs.max(1),
            sort: SortColumn::TotalCalls,
            previous: None,
        }
    }

    /// Applies one keypress to the loop state.
    ///
    /// `+`/`=` lengthen the interval, `-` shortens it (floored at one
    /// second), digits `1`-`4` pick the sort column, `q`/escape quit.
    /// Everything else is rejected without touching state.
    pub fn apply_key(&mut self, key: Key) -> KeyAction {
        match key {
            Key::Esc | Key::Char('q') => KeyAction::Quit,
            Key::Char('+') | Key::Char('=') => {
                self.refresh_interval_secs += 1;
                KeyAction::Applied
            }
            Key::Char('-') => {
                self.refresh_interval_secs = self.refresh_interval_secs.saturating_sub(1).max(1);
                KeyAction::Applied
            }
            Key::Char(c) if c.is_ascii_digit() => match SortColumn::from_digit(c) {
                Some(sort) => {
                    self.sort = sort;
                    KeyAction::Applied
                }
                None => KeyAction::Rejected("sort column must be 1-4"),
            },
            _ => KeyAction::Rejected("unrecognized key (use + - 1-4 q or esc)"),
        }
    }
}

/// Converts the actual time spent waiting into the rate divisor.
///
/// Round-to-nearest with a floor of one second: an early keypress must
/// never produce a sub-second (or zero) divisor.
pub fn calc_interval_secs(waited: Duration) -> u64 {
    (waited.as_secs_f64().round() as u64).max(1)
}

/// The monitor application: a stats source, an input source, loop state
/// and an output sink.
pub struct App<S, I, W> {
    source: S,
    input: I,
    state: LoopState,
    out: W,
}

impl<S: StatsSource, I: InputSource, W: Write> App<S, I, W> {
    pub fn new(source: S, input: I, state: LoopState, out: W) -> Self {
        Self {
            source,
            input,
            state,
            out,
        }
    }

    /// Runs the INITIAL → STEADY → TERMINATED state machine.
    ///
    /// Returns `Ok(())` on a user-requested quit. Any error — a failed
    /// fetch, a structurally invalid feed, a broken output pipe — unwinds
    /// through here; the input source's raw-mode guard is released when
    /// the app is dropped, on every path.
    pub fn run(&mut self) -> Result<(), AppError> {
        loop {
            // INITIAL: take the baseline sample, show the header only (no
            // diff is possible yet) and go steady without waiting for input.
            let Some(previous) = self.state.previous.take() else {
                let first = self.poll_snapshot()?;
                self.write_block(&render::header(&first.info, None))?;
                self.write_block(&format!(
                    "Got first commandstats, waiting {} seconds to get the next.",
                    self.state.refresh_interval_secs
                ))?;
                self.state.previous = Some(first);
                continue;
            };

            // STEADY: bounded wait, then poll unconditionally.
            let nominal = self.state.refresh_interval_secs;
            let started = Instant::now();
            let mut calc_interval = nominal;

            if self.input.poll_key(Duration::from_secs(nominal))? {
                // A keypress cuts the wait short, so the rate divisor must
                // be the time actually elapsed, not the nominal cadence.
                let waited = started.elapsed();
                calc_interval = calc_interval_secs(waited);
                let key = self.input.read_key()?;
                match self.state.apply_key(key) {
                    KeyAction::Quit => return Ok(()),
                    KeyAction::Rejected(msg) => {
                        self.write_block(&format!("ERROR: {}", msg))?;
                    }
                    KeyAction::Applied => {}
                }
            }

            let current = self.poll_snapshot()?;
            let rows = delta::rank(
                delta::delta_rows(&previous.commands, &current.commands, calc_interval).collect(),
                self.state.sort,
            );
            debug!(
                "cycle: calc_interval={}s, {} rows",
                calc_interval,
                rows.len()
            );
            self.write_block("")?;
            self.write_block(&render::header(&current.info, Some(&previous.info)))?;
            self.write_block(&render::table(
                &rows,
                self.state.sort,
                self.state.refresh_interval_secs,
            ))?;
            self.state.previous = Some(current);
        }
    }

    /// One poll: general info first, command stats second, back-to-back.
    fn poll_snapshot(&mut self) -> Result<StatSnapshot, AppError> {
        let info = parser::parse_info(&self.source.fetch_info()?)?;
        let commands = parser::parse_commandstats(&self.source.fetch_commandstats()?)?;
        Ok(StatSnapshot { info, commands })
    }

    /// Writes a rendered block line by line with explicit CRLF: raw mode
    /// disables output post-processing, so bare `\n` would stair-step.
    fn write_block(&mut self, text: &str) -> io::Result<()> {
        for line in text.lines() {
            write!(self.out, "{}\r\n", line)?;
        }
        if text.is_empty() {
            write!(self.out, "\r\n")?;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ScriptedInput, ScriptedKey};
    use std::sync::atomic::Ordering;

    // -- key handling --

    fn state() -> LoopState {
        LoopState::new(DEFAULT_INTERVAL_SECS)
    }

    #[test]
    fn plus_and_equals_lengthen_interval() {
        let mut st = state();
        assert_eq!(st.apply_key(Key::Char('+')), KeyAction::Applied);
        assert_eq!(st.refresh_interval_secs, 4);
        assert_eq!(st.apply_key(Key::Char('=')), KeyAction::Applied);
        assert_eq!(st.refresh_interval_secs, 5);
    }

    #[test]
    fn minus_never_drops_interval_below_one() {
        let mut st = state();
        for _ in 0..10 {
            st.apply_key(Key::Char('-'));
        }
        assert_eq!(st.refresh_interval_secs, 1);
    }

    #[test]
    fn digits_one_to_four_pick_sort_column() {
        let mut st = state();
        assert_eq!(st.apply_key(Key::Char('3')), KeyAction::Applied);
        assert_eq!(st.sort, SortColumn::CallsPerSec);
        assert_eq!(st.apply_key(Key::Char('1')), KeyAction::Applied);
        assert_eq!(st.sort, SortColumn::TotalCalls);
    }

    #[test]
    fn out_of_domain_keys_leave_state_unchanged() {
        let mut st = state();
        st.apply_key(Key::Char('2'));

        for key in [Key::Char('0'), Key::Char('5'), Key::Char('9')] {
            assert!(matches!(st.apply_key(key), KeyAction::Rejected(_)));
        }
        assert!(matches!(st.apply_key(Key::Char('z')), KeyAction::Rejected(_)));
        assert!(matches!(st.apply_key(Key::Other), KeyAction::Rejected(_)));

        assert_eq!(st.sort, SortColumn::SinceLast);
        assert_eq!(st.refresh_interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn quit_keys_terminate() {
        let mut st = state();
        assert_eq!(st.apply_key(Key::Char('q')), KeyAction::Quit);
        assert_eq!(st.apply_key(Key::Esc), KeyAction::Quit);
    }

    #[test]
    fn interval_floor_applies_at_construction() {
        assert_eq!(LoopState::new(0).refresh_interval_secs, 1);
    }

    // -- calc interval --

    #[test]
    fn calc_interval_uses_actual_wait_not_nominal() {
        // Nominal 5s cadence, key pressed after 2s: the divisor is 2.
        assert_eq!(calc_interval_secs(Duration::from_secs(2)), 2);
    }

    #[test]
    fn calc_interval_rounds_to_nearest_and_floors_at_one() {
        assert_eq!(calc_interval_secs(Duration::from_millis(2400)), 2);
        assert_eq!(calc_interval_secs(Duration::from_millis(2600)), 3);
        assert_eq!(calc_interval_secs(Duration::from_millis(300)), 1);
        assert_eq!(calc_interval_secs(Duration::ZERO), 1);
    }

    // -- full loop --

    /// Scripted stats source: replays canned INFO text, repeating the last
    /// sample, optionally failing after a set number of polls.
    struct ScriptedSource {
        samples: Vec<(String, String)>,
        polls: usize,
        fail_after: Option<usize>,
    }

    impl ScriptedSource {
        fn new(samples: Vec<(String, String)>) -> Self {
            Self {
                samples,
                polls: 0,
                fail_after: None,
            }
        }

        fn failing_after(mut self, polls: usize) -> Self {
            self.fail_after = Some(polls);
            self
        }

        fn current(&self) -> &(String, String) {
            let idx = self.polls.min(self.samples.len() - 1);
            &self.samples[idx]
        }
    }

    impl StatsSource for ScriptedSource {
        fn fetch_info(&mut self) -> Result<String, SourceError> {
            if self.fail_after.is_some_and(|n| self.polls >= n) {
                return Err(SourceError::Query("connection reset".to_string()));
            }
            Ok(self.current().0.clone())
        }

        fn fetch_commandstats(&mut self) -> Result<String, SourceError> {
            let text = self.current().1.clone();
            self.polls += 1;
            Ok(text)
        }
    }

    fn sample(connections: u64, get_calls: i64, set_calls: i64) -> (String, String) {
        let info = format!(
            "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\n\
             os:Linux\r\nprocess_id:42\r\nuptime_in_days:3\r\n\
             # Clients\r\nconnected_clients:2\r\n\
             # Stats\r\ntotal_connections_received:{}\r\n\
             instantaneous_ops_per_sec:10\r\n\
             # Replication\r\nrole:master\r\nconnected_slaves:0\r\n",
            connections
        );
        let commands = format!(
            "# Commandstats\r\n\
             cmdstat_get:calls={},usec={},usec_per_call=10.00\r\n\
             cmdstat_set:calls={},usec={},usec_per_call=20.00\r\n",
            get_calls,
            get_calls * 10,
            set_calls,
            set_calls * 20
        );
        (info, commands)
    }

    fn run_app(
        source: ScriptedSource,
        input: ScriptedInput,
    ) -> (Result<(), AppError>, String, usize) {
        let restored = input.restore_counter();
        let mut out = Vec::new();
        let mut app = App::new(source, input, state(), &mut out);
        let result = app.run();
        drop(app);
        (
            result,
            String::from_utf8(out).unwrap(),
            restored.load(Ordering::SeqCst),
        )
    }

    #[test]
    fn initial_cycle_prints_header_only_then_quits() {
        let source = ScriptedSource::new(vec![sample(100, 10, 5), sample(137, 40, 8)]);
        // The quit key lands during the SECOND steady wait, so exactly one
        // full cycle renders first.
        let input = ScriptedInput::with_steps([ScriptedKey {
            after: Duration::from_secs(4),
            key: Key::Char('q'),
        }]);

        let (result, output, restored) = run_app(source, input);
        assert!(result.is_ok());
        assert_eq!(restored, 1);

        // Header from the baseline sample, no table yet.
        assert!(output.contains("Redis 7.2.4 (standalone)"));
        assert!(output.contains("Got first commandstats, waiting 3 seconds"));

        // One steady cycle before the quit key on the second wait.
        assert!(output.contains("137 total connections (37 new)"));
        assert!(output.contains("sorting on 'total'"));
    }

    #[test]
    fn rejected_key_prints_error_and_preserves_cadence() {
        let source = ScriptedSource::new(vec![sample(100, 10, 5), sample(110, 20, 6)]);
        let input = ScriptedInput::immediate([Key::Char('7'), Key::Char('q')]);

        let (result, output, restored) = run_app(source, input);
        assert!(result.is_ok());
        assert_eq!(restored, 1);
        assert!(output.contains("ERROR: sort column must be 1-4"));
        // The rejected cycle still polled and rendered.
        assert!(output.contains("refresh interval: 3 seconds"));
        assert!(output.contains("sorting on 'total'"));
    }

    #[test]
    fn sort_key_changes_ranking_next_render() {
        // usec/call ranks set (20.00) above get (10.00).
        let source = ScriptedSource::new(vec![sample(100, 100, 5), sample(110, 300, 6)]);
        let input = ScriptedInput::immediate([Key::Char('4'), Key::Char('q')]);

        let (result, output, _) = run_app(source, input);
        assert!(result.is_ok());
        assert!(output.contains("sorting on 'usec/call'"));
        let set_pos = output.find("\r\nset ").unwrap();
        let get_pos = output.find("\r\nget ").unwrap();
        assert!(set_pos < get_pos);
    }

    #[test]
    fn midrun_fetch_failure_is_fatal_but_still_restores_terminal() {
        let source = ScriptedSource::new(vec![sample(100, 10, 5)]).failing_after(1);
        let input = ScriptedInput::immediate([]);

        let (result, _, restored) = run_app(source, input);
        assert!(matches!(result, Err(AppError::Source(_))));
        assert_eq!(restored, 1);
    }

    #[test]
    fn structurally_invalid_feed_is_fatal() {
        let source = ScriptedSource::new(vec![(
            "redis_version:7.2.4\n".to_string(),
            String::new(),
        )]);
        let input = ScriptedInput::immediate([]);

        let (result, _, restored) = run_app(source, input);
        assert!(matches!(result, Err(AppError::Parse(_))));
        assert_eq!(restored, 1);
    }
}
