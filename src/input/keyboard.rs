use super::{ButtonSignal, ButtonSource, SourcePoll};
use crate::terminal_restore::TerminalRestoreGuard;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    io::{self, BufRead, IsTerminal},
    thread,
    time::Duration,
};
use tracing::{debug, info, warn};

/// Keyboard fallback on an interactive terminal: raw mode, polled every tick.
/// Space presses the button, Ctrl-C asks for shutdown.
pub struct RawTerminalKeys {
    signal: ButtonSignal,
    guard: Option<TerminalRestoreGuard>,
}

impl RawTerminalKeys {
    pub fn open(signal: ButtonSignal) -> Result<Self> {
        let guard = TerminalRestoreGuard::new();
        guard
            .enable_raw_mode()
            .context("failed to put terminal into raw mode")?;
        Ok(Self {
            signal,
            guard: Some(guard),
        })
    }

    fn handle_key(&self, key: KeyEvent) -> SourcePoll {
        if key.kind != KeyEventKind::Press {
            return SourcePoll::Idle;
        }
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('C')
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                info!("Ctrl-C on terminal; shutdown requested");
                SourcePoll::ShutdownRequested
            }
            KeyCode::Char(' ') => {
                debug!("space pressed on terminal");
                self.signal.raise();
                SourcePoll::Idle
            }
            _ => SourcePoll::Idle,
        }
    }
}

impl ButtonSource for RawTerminalKeys {
    fn label(&self) -> &'static str {
        "terminal"
    }

    fn pump(&mut self) -> SourcePoll {
        if self.guard.is_none() {
            return SourcePoll::Idle;
        }
        let mut outcome = SourcePoll::Idle;
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    warn!("terminal poll failed: {err}");
                    break;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) => {
                    if self.handle_key(key) == SourcePoll::ShutdownRequested {
                        outcome = SourcePoll::ShutdownRequested;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("terminal read failed: {err}");
                    break;
                }
            }
        }
        outcome
    }

    fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.restore();
            debug!("terminal mode restored");
        }
    }
}

/// Keyboard fallback when stdin is not a terminal (piped, or hosted by another
/// tool). A detached thread blocks on whole lines and raises the signal; it never
/// touches the control loop directly.
pub struct LineListener {
    _reader: thread::JoinHandle<()>,
}

impl LineListener {
    pub fn spawn(signal: ButtonSignal) -> Result<Self> {
        let reader = thread::Builder::new()
            .name("stdin-lines".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) if line_is_press(&line) => {
                            debug!("button press from stdin line");
                            signal.raise();
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!("stdin read error, line listener stopping: {err}");
                            return;
                        }
                    }
                }
                debug!("stdin closed; line listener stopping");
            })
            .context("failed to spawn stdin line listener")?;
        Ok(Self { _reader: reader })
    }
}

impl ButtonSource for LineListener {
    fn label(&self) -> &'static str {
        "stdin-lines"
    }
}

/// A line counts as a press when it is empty, contains a space, or is the word
/// "space" in any case.
pub fn line_is_press(line: &str) -> bool {
    let line = line.trim_end_matches(['\r', '\n']);
    line.is_empty() || line.contains(' ') || line.eq_ignore_ascii_case("space")
}

/// Pick the keyboard strategy once, based on whether stdin is a terminal.
pub fn open_keyboard_source(signal: ButtonSignal) -> Result<Box<dyn ButtonSource>> {
    if io::stdin().is_terminal() {
        match RawTerminalKeys::open(signal.clone()) {
            Ok(keys) => {
                info!("keyboard fallback: raw terminal (space = button, Ctrl-C = quit)");
                return Ok(Box::new(keys));
            }
            Err(err) => warn!("raw terminal unavailable, using line input: {err:#}"),
        }
    }
    info!("keyboard fallback: line input (empty line or \"space\" = button)");
    Ok(Box::new(LineListener::spawn(signal)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_lines() {
        assert!(line_is_press(""));
        assert!(line_is_press("\r\n"));
        assert!(line_is_press(" "));
        assert!(line_is_press("hello there"));
        assert!(line_is_press("space"));
        assert!(line_is_press("SPACE"));
        assert!(line_is_press("Space\r"));
    }

    #[test]
    fn other_lines_are_ignored() {
        assert!(!line_is_press("x"));
        assert!(!line_is_press("spacebar"));
        assert!(!line_is_press("q"));
    }

    fn keys_without_terminal(signal: ButtonSignal) -> RawTerminalKeys {
        RawTerminalKeys {
            signal,
            guard: None,
        }
    }

    #[test]
    fn space_key_raises_signal() {
        let signal = ButtonSignal::new();
        let keys = keys_without_terminal(signal.clone());
        let outcome = keys.handle_key(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
        assert_eq!(outcome, SourcePoll::Idle);
        assert!(signal.take());
    }

    #[test]
    fn ctrl_c_requests_shutdown_without_press() {
        let signal = ButtonSignal::new();
        let keys = keys_without_terminal(signal.clone());
        let outcome =
            keys.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(outcome, SourcePoll::ShutdownRequested);
        assert!(!signal.is_raised());
    }

    #[test]
    fn other_keys_do_nothing() {
        let signal = ButtonSignal::new();
        let keys = keys_without_terminal(signal.clone());
        assert_eq!(
            keys.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)),
            SourcePoll::Idle
        );
        assert_eq!(
            keys.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)),
            SourcePoll::Idle
        );
        assert!(!signal.is_raised());
    }
}
