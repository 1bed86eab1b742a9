use super::defaults::{
    default_track_table, MAX_BUTTON_PIN, MAX_DEBOUNCE_MS, MAX_GPIO_BASE, MAX_POLL_MS,
    MAX_STOP_GRACE_MS, MIN_POLL_MS, MIN_STOP_GRACE_MS,
};
use super::tracks::load_track_table;
use super::AppConfig;
use crate::input::GpioConfig;
use crate::player::PlayerCommand;
use crate::rotation::{Rotation, TrackEntry};
use anyhow::{bail, Context, Result};
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

impl AppConfig {
    /// Check CLI values and turn every path absolute.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_POLL_MS..=MAX_POLL_MS).contains(&self.poll_ms) {
            bail!(
                "--poll-ms must be between {MIN_POLL_MS} and {MAX_POLL_MS}, got {}",
                self.poll_ms
            );
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            bail!(
                "--debounce-ms must be at most {MAX_DEBOUNCE_MS}, got {}",
                self.debounce_ms
            );
        }
        if !(MIN_STOP_GRACE_MS..=MAX_STOP_GRACE_MS).contains(&self.stop_grace_ms) {
            bail!(
                "--stop-grace-ms must be between {MIN_STOP_GRACE_MS} and {MAX_STOP_GRACE_MS}, got {}",
                self.stop_grace_ms
            );
        }
        if self.button_pin > MAX_BUTTON_PIN {
            bail!(
                "--button-pin must be at most {MAX_BUTTON_PIN}, got {}",
                self.button_pin
            );
        }
        if let Some(base) = self.gpio_base.filter(|base| *base > MAX_GPIO_BASE) {
            bail!("--gpio-base must be at most {MAX_GPIO_BASE}, got {base}");
        }
        PlayerCommand::parse(&self.ring_cmd).context("invalid --ring-cmd")?;
        PlayerCommand::parse(&self.track_cmd).context("invalid --track-cmd")?;

        let base = match self.base_dir.take() {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => env::current_dir()
                .context("failed to resolve current directory")?
                .join(dir),
            None => env::current_dir().context("failed to resolve current directory")?,
        };
        self.audio_dir = resolve_under(&base, &self.audio_dir);
        self.ring_file = resolve_under(&self.audio_dir, &self.ring_file);
        self.state_file = resolve_under(&base, &self.state_file);
        self.log_file = resolve_under(&base, &self.log_file);
        self.tracks = self.tracks.as_deref().map(|path| resolve_under(&base, path));
        self.base_dir = Some(base);
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn ring_path(&self) -> &Path {
        &self.ring_file
    }

    pub fn track_path(&self, entry: &TrackEntry) -> PathBuf {
        self.audio_dir.join(&entry.file)
    }

    pub fn ring_command(&self) -> Result<PlayerCommand> {
        PlayerCommand::parse(&self.ring_cmd).context("invalid --ring-cmd")
    }

    pub fn track_command(&self) -> Result<PlayerCommand> {
        PlayerCommand::parse(&self.track_cmd).context("invalid --track-cmd")
    }

    pub fn gpio_config(&self) -> GpioConfig {
        GpioConfig {
            root: self.gpio_root.clone(),
            pin: self.button_pin,
            base: self.gpio_base,
            debounce: self.debounce(),
        }
    }

    /// The `--tracks` table when given, otherwise the built-in rotation.
    pub fn load_rotation(&self) -> Result<Rotation> {
        let entries = match &self.tracks {
            Some(path) => load_track_table(path)?,
            None => default_track_table(),
        };
        Rotation::new(entries)
    }
}

fn resolve_under(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
