//! Single-key input sources.
//!
//! The sampling loop needs exactly two capabilities: "was a key pressed
//! within the next N seconds" and "read the pressed key". [`InputSource`]
//! abstracts both so the loop never touches the terminal directly. Two
//! interchangeable implementations exist: [`TerminalInput`] over crossterm
//! for real sessions, and [`ScriptedInput`] for deterministic tests.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::debug;

/// A single decoded keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable character key.
    Char(char),
    /// The escape key.
    Esc,
    /// Any other key (arrows, function keys, enter, ...).
    Other,
}

/// Bounded-wait keyboard input.
pub trait InputSource {
    /// Waits up to `timeout` for a keypress. Returns `true` the instant a
    /// key is available, `false` once the timeout elapses with no input.
    fn poll_key(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Reads one pressed key. Call only after [`poll_key`] returned `true`.
    ///
    /// [`poll_key`]: InputSource::poll_key
    fn read_key(&mut self) -> io::Result<Key>;
}

/// Scopes the terminal's raw-mode override.
///
/// Raw mode is entered on acquisition and left on drop, so the user's
/// terminal is restored on every exit path, including unwinding out of the
/// sampling loop.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Nothing useful to do with a failure here; the process is exiting.
        let _ = terminal::disable_raw_mode();
        debug!("terminal raw mode released");
    }
}

/// Real keyboard input over crossterm.
///
/// Construction switches the terminal to raw (unbuffered, no-echo) mode;
/// dropping the value restores it.
pub struct TerminalInput {
    _raw: RawModeGuard,
    /// Key consumed by `poll_key` while filtering non-key events.
    pending: Option<Key>,
}

impl TerminalInput {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            _raw: RawModeGuard::acquire()?,
            pending: None,
        })
    }
}

/// Decodes a terminal event, keeping only key PRESS events so key repeats
/// and release reports never count as input.
fn translate(event: Event) -> Option<Key> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(match key.code {
            // In raw mode Ctrl-C arrives as a plain key event; treat it
            // like escape so it still terminates.
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Esc,
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Esc => Key::Esc,
            _ => Key::Other,
        }),
        _ => None,
    }
}

impl InputSource for TerminalInput {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                return Ok(false);
            }
            // poll() also wakes for resize/mouse events; drain until a key
            // press shows up or the deadline passes.
            if let Some(key) = translate(event::read()?) {
                self.pending = Some(key);
                return Ok(true);
            }
        }
    }

    fn read_key(&mut self) -> io::Result<Key> {
        if let Some(key) = self.pending.take() {
            return Ok(key);
        }
        loop {
            if let Some(key) = translate(event::read()?) {
                return Ok(key);
            }
        }
    }
}

/// One scripted keypress arriving `after` seconds into a bounded wait.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedKey {
    pub after: Duration,
    pub key: Key,
}

/// Deterministic input source for tests.
///
/// Plays back a fixed sequence of keypresses without touching the
/// terminal. A step whose delay exceeds the polled timeout is carried
/// over into the next wait, mimicking a user who presses a key several
/// cycles later. Dropping the source records a "terminal restored" event
/// so tests can assert release-exactly-once semantics.
pub struct ScriptedInput {
    steps: VecDeque<ScriptedKey>,
    restored: Arc<AtomicUsize>,
}

impl ScriptedInput {
    /// Script where every key arrives immediately on the next wait.
    pub fn immediate(keys: impl IntoIterator<Item = Key>) -> Self {
        Self::with_steps(keys.into_iter().map(|key| ScriptedKey {
            after: Duration::ZERO,
            key,
        }))
    }

    pub fn with_steps(steps: impl IntoIterator<Item = ScriptedKey>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            restored: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter incremented once when the source is dropped.
    pub fn restore_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.restored)
    }
}

impl Drop for ScriptedInput {
    fn drop(&mut self) {
        self.restored.fetch_add(1, Ordering::SeqCst);
    }
}

impl InputSource for ScriptedInput {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<bool> {
        match self.steps.front_mut() {
            None => Ok(false),
            Some(step) if step.after <= timeout => Ok(true),
            Some(step) => {
                step.after -= timeout;
                Ok(false)
            }
        }
    }

    fn read_key(&mut self) -> io::Result<Key> {
        self.steps
            .pop_front()
            .map(|step| step.key)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }
}
