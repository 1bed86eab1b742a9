//! Button input: one coalescing "pressed" signal fed by a hardware line and a
//! keyboard fallback.

mod gpio;
mod keyboard;

pub use gpio::{detect_chip_base, Debounce, GpioButton, GpioConfig};
pub use keyboard::{line_is_press, open_keyboard_source, LineListener, RawTerminalKeys};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::debug;

/// Shared "pressed since last consumed" flag.
///
/// Producers only ever set it; the control loop is the only one that clears it,
/// so a press is never lost between `raise` and `take`.
#[derive(Debug, Clone, Default)]
pub struct ButtonSignal {
    pressed: Arc<AtomicBool>,
}

impl ButtonSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.pressed.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.pressed.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.pressed.swap(false, Ordering::SeqCst)
    }
}

/// Result of pumping a source on the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePoll {
    Idle,
    ShutdownRequested,
}

/// A producer of button presses.
///
/// Background sources (GPIO edges, line reads) raise the shared signal from their
/// own thread and leave `pump` as a no-op. Sources that must be polled on the
/// control thread (raw terminal keys) do their work in `pump`.
pub trait ButtonSource {
    fn label(&self) -> &'static str;

    fn pump(&mut self) -> SourcePoll {
        SourcePoll::Idle
    }

    /// Release whatever the source holds. Must tolerate being called twice.
    fn release(&mut self) {}
}

/// Merges every configured source into one [`ButtonSignal`].
pub struct InputMerger {
    signal: ButtonSignal,
    sources: Vec<Box<dyn ButtonSource>>,
}

impl InputMerger {
    pub fn new(signal: ButtonSignal) -> Self {
        Self {
            signal,
            sources: Vec::new(),
        }
    }

    /// Register a source. Sources are released in reverse registration order.
    pub fn add_source(&mut self, source: Box<dyn ButtonSource>) {
        debug!(source = source.label(), "button source registered");
        self.sources.push(source);
    }

    pub fn signal(&self) -> &ButtonSignal {
        &self.signal
    }

    pub fn source_labels(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.label()).collect()
    }

    /// Has a press been observed since the last `consume`/`discard`?
    pub fn poll(&self) -> bool {
        self.signal.is_raised()
    }

    /// Consume a pending press. Any number of raises collapse into one `true`.
    pub fn consume(&self) -> bool {
        self.signal.take()
    }

    /// Drop any pending press without acting on it.
    pub fn discard(&self) {
        if self.signal.take() {
            debug!("button press ignored in current state");
        }
    }

    /// Give control-thread sources a chance to read input.
    pub fn pump(&mut self) -> SourcePoll {
        let mut outcome = SourcePoll::Idle;
        for source in &mut self.sources {
            if source.pump() == SourcePoll::ShutdownRequested {
                outcome = SourcePoll::ShutdownRequested;
            }
        }
        outcome
    }

    pub fn release(&mut self) {
        for source in self.sources.iter_mut().rev() {
            debug!(source = source.label(), "releasing button source");
            source.release();
        }
    }
}
