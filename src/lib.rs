pub mod app;
pub mod config;
pub mod controller;
pub mod doctor;
pub mod input;
pub mod player;
pub mod pointer;
pub mod rotation;
pub mod runtime;
pub mod terminal_restore;

pub use app::{init_logging, log_panic};
pub use controller::{Controller, PlaybackState};
pub use input::{ButtonSignal, ButtonSource, InputMerger, SourcePoll};
pub use player::{PlayerControl, ProcessSupervisor, TrackStatus};
pub use pointer::PointerStore;
pub use rotation::{Rotation, TrackEntry};
pub use runtime::{ExitReason, Runtime, ShutdownFlag};
