use crate::rotation::TrackEntry;

pub const DEFAULT_AUDIO_DIR: &str = "audio";
pub const DEFAULT_RING_FILE: &str = "ring.mp3";
pub const DEFAULT_STATE_FILE: &str = "track_state.txt";
pub const DEFAULT_LOG_FILE: &str = "conch.log";
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";
pub const DEFAULT_RING_CMD: &str = "mpg123 -q --loop -1 {file}";
pub const DEFAULT_TRACK_CMD: &str = "mpg123 -q {file}";

/// BCM numbering.
pub const DEFAULT_BUTTON_PIN: u32 = 17;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_POLL_MS: u64 = 100;
pub const DEFAULT_STOP_GRACE_MS: u64 = 5_000;

pub(super) const MIN_POLL_MS: u64 = 10;
pub(super) const MAX_POLL_MS: u64 = 1_000;
pub(super) const MAX_DEBOUNCE_MS: u64 = 5_000;
pub(super) const MIN_STOP_GRACE_MS: u64 = 100;
pub(super) const MAX_STOP_GRACE_MS: u64 = 60_000;
pub(super) const MAX_BUTTON_PIN: u32 = 511;
pub(super) const MAX_GPIO_BASE: u32 = 4_096;

// file, silence_min, silence_max (minutes)
const INSTALLATION_TRACKS: &[(&str, f64, f64)] = &[
    ("01.mp3", 15.0, 20.0),
    ("02.mp3", 20.0, 25.0),
    ("03.mp3", 18.0, 22.0),
    ("04.mp3", 16.0, 21.0),
    ("05.mp3", 19.0, 24.0),
    ("06.mp3", 15.0, 20.0),
    ("07.mp3", 22.0, 25.0),
    ("08.mp3", 17.0, 22.0),
    ("09.mp3", 20.0, 25.0),
    ("10.mp3", 16.0, 21.0),
    ("11.mp3", 18.0, 23.0),
    ("12.mp3", 15.0, 20.0),
    ("13.mp3", 21.0, 25.0),
    ("14.mp3", 17.0, 22.0),
    ("15.mp3", 19.0, 24.0),
    ("16.mp3", 16.0, 21.0),
    ("17.mp3", 20.0, 25.0),
    ("18.mp3", 15.0, 20.0),
    ("19.mp3", 18.0, 23.0),
    ("20.mp3", 22.0, 25.0),
    ("21.mp3", 17.0, 22.0),
    ("22.mp3", 19.0, 24.0),
    ("23.mp3", 15.0, 20.0),
    ("24.mp3", 16.0, 21.0),
    ("25.mp3", 20.0, 25.0),
    ("26.mp3", 18.0, 23.0),
    ("27.mp3", 21.0, 25.0),
    ("28.mp3", 17.0, 22.0),
    ("29.mp3", 15.0, 20.0),
    ("30.mp3", 19.0, 24.0),
];

/// The installation's built-in rotation, used when no `--tracks` file is given.
pub fn default_track_table() -> Vec<TrackEntry> {
    INSTALLATION_TRACKS
        .iter()
        .map(|&(file, min, max)| TrackEntry::new(file, min, max))
        .collect()
}
