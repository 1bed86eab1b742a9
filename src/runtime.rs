//! Control loop, signal handling, and the release-once shutdown sequence.

use crate::config::AppConfig;
use crate::controller::{Controller, PlaybackState};
use crate::doctor::preflight;
use crate::input::{open_keyboard_source, ButtonSignal, GpioButton, InputMerger, SourcePoll};
use crate::player::{PlayerControl, ProcessSupervisor};
use crate::pointer::PointerStore;
use anyhow::{anyhow, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

/// Set by the SIGINT/SIGTERM/SIGHUP handler.
static SIGNAL_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Signal handler for termination requests.
///
/// Only flips an atomic flag (async-signal-safe); the loop notices it next tick.
extern "C" fn handle_termination(_: libc::c_int) {
    SIGNAL_RECEIVED.store(true, Ordering::SeqCst);
}

pub fn install_signal_handlers() -> Result<()> {
    for signo in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
        // SAFETY: handle_termination is an extern "C" handler that only stores to an
        // atomic, which is async-signal-safe.
        unsafe {
            let handler = handle_termination as *const () as libc::sighandler_t;
            if libc::signal(signo, handler) == libc::SIG_ERR {
                return Err(anyhow!("failed to install handler for signal {signo}"));
            }
        }
    }
    Ok(())
}

/// Shutdown request visible to the control loop.
#[derive(Debug, Clone)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
    observe_signals: bool,
}

impl ShutdownFlag {
    /// Flag that also trips when the process receives a termination signal.
    pub fn with_signals() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            observe_signals: true,
        }
    }

    /// Flag that only trips through `request`.
    pub fn detached() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            observe_signals: false,
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
            || (self.observe_signals && SIGNAL_RECEIVED.load(Ordering::SeqCst))
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Signal,
    Interrupt,
}

/// Owns everything the loop touches. Dropping it runs the shutdown sequence if
/// nobody ran it yet.
pub struct Runtime<P: PlayerControl, R: Rng> {
    controller: Controller<P, R>,
    input: InputMerger,
    shutdown: ShutdownFlag,
    poll_interval: Duration,
    released: bool,
}

impl<P: PlayerControl, R: Rng> Runtime<P, R> {
    pub fn new(
        controller: Controller<P, R>,
        input: InputMerger,
        shutdown: ShutdownFlag,
        poll_interval: Duration,
    ) -> Self {
        Self {
            controller,
            input,
            shutdown,
            poll_interval,
            released: false,
        }
    }

    pub fn controller(&self) -> &Controller<P, R> {
        &self.controller
    }

    pub fn input(&self) -> &InputMerger {
        &self.input
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// One loop iteration without the sleep: state tick, then keyboard input.
    pub fn step(&mut self, now: Instant) -> Option<ExitReason> {
        if self.shutdown.is_requested() {
            return Some(ExitReason::Signal);
        }
        self.controller.tick(now, &self.input);
        if self.input.pump() == SourcePoll::ShutdownRequested {
            return Some(ExitReason::Interrupt);
        }
        None
    }

    /// Tick until a shutdown is requested.
    pub fn run(&mut self) -> ExitReason {
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            sources = ?self.input.source_labels(),
            "control loop running"
        );
        loop {
            if let Some(reason) = self.step(Instant::now()) {
                info!(?reason, state = %self.controller.state(), "shutdown requested");
                return reason;
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Stop the active player, restore the input mode, release the hardware pin.
    /// Runs once; every step runs even if an earlier one panics.
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let state = self.controller.state();
        info!(%state, "shutting down");
        let controller = &mut self.controller;
        if panic::catch_unwind(AssertUnwindSafe(|| controller.stop_active())).is_err() {
            error!("stopping the active player panicked");
        }
        let input = &mut self.input;
        if panic::catch_unwind(AssertUnwindSafe(|| input.release())).is_err() {
            error!("releasing input sources panicked");
        }
        info!("shutdown complete");
    }
}

impl<P: PlayerControl, R: Rng> Drop for Runtime<P, R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bootstrap the installation from validated config and run until shutdown.
///
/// Returns the process exit code: 0 after a requested shutdown, 1 after an
/// unhandled fault in the loop.
pub fn run(config: &AppConfig) -> Result<i32> {
    let rotation = config.load_rotation()?;
    let report = preflight(config, &rotation)?;
    for missing in &report.missing_tracks {
        warn!(file = %missing.display(), "track file missing; it will be skipped when its turn comes");
    }

    install_signal_handlers()?;
    let shutdown = ShutdownFlag::with_signals();

    let supervisor = ProcessSupervisor::new(
        config.ring_command()?,
        config.track_command()?,
        config.ring_path(),
        config.stop_grace(),
    );
    let signal = ButtonSignal::new();
    let input = build_input(config, &signal)?;
    let controller = Controller::new(
        rotation,
        config.audio_dir.clone(),
        PointerStore::new(&config.state_file),
        supervisor,
        StdRng::from_entropy(),
        Instant::now(),
    );
    let mut runtime = Runtime::new(controller, input, shutdown, config.poll_interval());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| runtime.run()));
    let code = match outcome {
        Ok(reason) => {
            info!(?reason, "control loop stopped");
            0
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(
                state = %runtime.controller().state(),
                pointer = runtime.controller().pointer(),
                "unhandled fault in control loop: {message}"
            );
            1
        }
    };
    runtime.shutdown();
    Ok(code)
}

fn build_input(config: &AppConfig, signal: &ButtonSignal) -> Result<InputMerger> {
    let mut input = InputMerger::new(signal.clone());
    if config.no_gpio {
        info!("hardware button disabled by --no-gpio");
    } else {
        match GpioButton::open(&config.gpio_config(), signal.clone()) {
            Ok(button) => input.add_source(Box::new(button)),
            Err(err) => warn!("hardware button unavailable, keyboard only: {err:#}"),
        }
    }
    input.add_source(open_keyboard_source(signal.clone())?);
    Ok(input)
}
