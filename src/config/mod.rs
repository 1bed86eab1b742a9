//! Command-line parsing and validation helpers.

mod defaults;
mod tracks;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

pub use defaults::{
    default_track_table, DEFAULT_AUDIO_DIR, DEFAULT_BUTTON_PIN, DEFAULT_DEBOUNCE_MS,
    DEFAULT_GPIO_ROOT, DEFAULT_LOG_FILE, DEFAULT_POLL_MS, DEFAULT_RING_CMD, DEFAULT_RING_FILE,
    DEFAULT_STATE_FILE, DEFAULT_STOP_GRACE_MS, DEFAULT_TRACK_CMD,
};
pub use tracks::{load_track_table, validate_track_table};

/// CLI options for the controller. Relative paths are resolved by `validate`.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "conch",
    about = "Conch: rings after a random silence and plays the next track when answered",
    author,
    version
)]
pub struct AppConfig {
    /// Directory that relative paths are resolved against (default: current directory)
    #[arg(long = "base-dir", env = "CONCH_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Directory holding the ring and track audio files
    #[arg(long = "audio-dir", env = "CONCH_AUDIO_DIR", default_value = DEFAULT_AUDIO_DIR)]
    pub audio_dir: PathBuf,

    /// Ring audio file (relative paths are inside the audio directory)
    #[arg(long = "ring-file", env = "CONCH_RING_FILE", default_value = DEFAULT_RING_FILE)]
    pub ring_file: PathBuf,

    /// File holding the persisted rotation pointer
    #[arg(long = "state-file", env = "CONCH_STATE_FILE", default_value = DEFAULT_STATE_FILE)]
    pub state_file: PathBuf,

    /// Log file (rotated at 1 MB, two backups kept)
    #[arg(long = "log-file", env = "CONCH_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// JSON or YAML track table; the built-in 30-track rotation is used when omitted
    #[arg(long = "tracks", env = "CONCH_TRACKS")]
    pub tracks: Option<PathBuf>,

    /// Command that loops the ring file forever ({file} is replaced by the path)
    #[arg(long = "ring-cmd", env = "CONCH_RING_CMD", default_value = DEFAULT_RING_CMD)]
    pub ring_cmd: String,

    /// Command that plays one track and exits ({file} is replaced by the path)
    #[arg(long = "track-cmd", env = "CONCH_TRACK_CMD", default_value = DEFAULT_TRACK_CMD)]
    pub track_cmd: String,

    /// Button input pin (BCM numbering)
    #[arg(long = "button-pin", env = "CONCH_BUTTON_PIN", default_value_t = DEFAULT_BUTTON_PIN)]
    pub button_pin: u32,

    /// Sysfs number of the GPIO chip's first line (auto-detected when omitted)
    #[arg(long = "gpio-base", env = "CONCH_GPIO_BASE")]
    pub gpio_base: Option<u32>,

    /// Sysfs GPIO root
    #[arg(long = "gpio-root", default_value = DEFAULT_GPIO_ROOT, hide = true)]
    pub gpio_root: PathBuf,

    /// Disable the hardware button and use the keyboard only
    #[arg(long = "no-gpio", env = "CONCH_NO_GPIO", default_value_t = false)]
    pub no_gpio: bool,

    /// Ignore repeated button edges closer together than this (milliseconds)
    #[arg(long = "debounce-ms", default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,

    /// Control loop interval (milliseconds)
    #[arg(long = "poll-ms", default_value_t = DEFAULT_POLL_MS)]
    pub poll_ms: u64,

    /// Time a player gets to exit after SIGTERM before it is killed (milliseconds)
    #[arg(long = "stop-grace-ms", default_value_t = DEFAULT_STOP_GRACE_MS)]
    pub stop_grace_ms: u64,

    /// Disable the log file
    #[arg(long = "no-logs", env = "CONCH_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Also write log lines to stderr
    #[arg(long = "log-stderr", env = "CONCH_LOG_STDERR", default_value_t = false)]
    pub log_stderr: bool,

    /// Minimum level written to the log
    #[arg(
        long = "log-level",
        env = "CONCH_LOG_LEVEL",
        value_enum,
        default_value_t = LogLevel::Info
    )]
    pub log_level: LogLevel,

    /// Print preflight diagnostics and exit
    #[arg(long = "doctor", default_value_t = false)]
    pub doctor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}
