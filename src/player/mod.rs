//! Supervision of the external audio players.
//!
//! At most one process is alive per role: the `ring` player loops the ring file
//! until stopped, the `track` player plays one file and exits on its own. The
//! supervisor never restarts anything itself; it reports status and the
//! controller decides.

mod command;
mod process;

pub use command::PlayerCommand;
pub use process::{PlayerProcess, Role, StopOutcome};

use anyhow::{bail, Context, Result};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info, warn};

/// Non-blocking view of the track player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Running,
    ExitedOk,
    /// Non-zero exit, death by signal (`None`), or a launch that never happened (`None`).
    ExitedError(Option<i32>),
}

impl TrackStatus {
    pub fn is_running(self) -> bool {
        self == TrackStatus::Running
    }
}

/// What the playback controller needs from the supervisor.
pub trait PlayerControl {
    /// Start the looping ring player. Starting while one is live is an error.
    fn start_ring(&mut self) -> Result<()>;
    /// Is the ring player still running? An exit is reported once and the
    /// handle dropped.
    fn ring_alive(&mut self) -> bool;
    fn stop_ring(&mut self);
    /// Start the single-shot player for `file`. Launch failures surface later as
    /// `TrackStatus::ExitedError(None)`.
    fn start_track(&mut self, file: &Path);
    fn track_status(&mut self) -> TrackStatus;
    fn stop_track(&mut self);
}

enum TrackSlot {
    Idle,
    Running(PlayerProcess),
    LaunchFailed,
}

pub struct ProcessSupervisor {
    ring_command: PlayerCommand,
    track_command: PlayerCommand,
    ring_file: PathBuf,
    grace: Duration,
    ring: Option<PlayerProcess>,
    track: TrackSlot,
}

impl ProcessSupervisor {
    pub fn new(
        ring_command: PlayerCommand,
        track_command: PlayerCommand,
        ring_file: impl Into<PathBuf>,
        grace: Duration,
    ) -> Self {
        Self {
            ring_command,
            track_command,
            ring_file: ring_file.into(),
            grace,
            ring: None,
            track: TrackSlot::Idle,
        }
    }

    pub fn ring_running(&self) -> bool {
        self.ring.is_some()
    }

    pub fn track_running(&self) -> bool {
        matches!(self.track, TrackSlot::Running(_))
    }

    /// Stop whatever is alive in either role.
    pub fn stop_all(&mut self) {
        self.stop_ring();
        self.stop_track();
    }
}

impl PlayerControl for ProcessSupervisor {
    fn start_ring(&mut self) -> Result<()> {
        if self.ring.is_some() {
            bail!("ring player already running");
        }
        let process = PlayerProcess::spawn(Role::Ring, &self.ring_command, &self.ring_file)
            .with_context(|| format!("failed to launch ring player {}", self.ring_command.program()))?;
        info!(pid = process.pid(), "ring started");
        self.ring = Some(process);
        Ok(())
    }

    fn ring_alive(&mut self) -> bool {
        let Some(process) = self.ring.as_mut() else {
            return false;
        };
        match process.try_exit() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!(pid = process.pid(), ?status, "ring player exited unexpectedly");
                process.kill_orphans();
                self.ring = None;
                false
            }
            Err(err) => {
                warn!(pid = process.pid(), "ring player status check failed: {err}");
                if let Some(process) = self.ring.take() {
                    process.stop(self.grace);
                }
                false
            }
        }
    }

    fn stop_ring(&mut self) {
        if let Some(process) = self.ring.take() {
            let outcome = process.stop(self.grace);
            debug!(?outcome, "ring stopped");
        }
    }

    fn start_track(&mut self, file: &Path) {
        if let TrackSlot::Running(_) = self.track {
            warn!("track player already running; stopping it first");
            self.stop_track();
        }
        self.track = match PlayerProcess::spawn(Role::Track, &self.track_command, file) {
            Ok(process) => {
                info!(pid = process.pid(), file = %file.display(), "track started");
                TrackSlot::Running(process)
            }
            Err(err) => {
                warn!(
                    file = %file.display(),
                    "failed to launch track player {}: {err}",
                    self.track_command.program()
                );
                TrackSlot::LaunchFailed
            }
        };
    }

    fn track_status(&mut self) -> TrackStatus {
        let status = match &mut self.track {
            TrackSlot::Running(process) => match process.try_exit() {
                Ok(None) => return TrackStatus::Running,
                Ok(Some(status)) if status.success() => TrackStatus::ExitedOk,
                Ok(Some(status)) => TrackStatus::ExitedError(status.code()),
                Err(err) => {
                    warn!(pid = process.pid(), "track player status check failed: {err}");
                    self.stop_track();
                    return TrackStatus::ExitedError(None);
                }
            },
            TrackSlot::LaunchFailed => TrackStatus::ExitedError(None),
            TrackSlot::Idle => {
                debug!("track status polled with no track started");
                TrackStatus::ExitedError(None)
            }
        };
        self.track = TrackSlot::Idle;
        status
    }

    fn stop_track(&mut self) {
        if let TrackSlot::Running(process) = std::mem::replace(&mut self.track, TrackSlot::Idle) {
            let outcome = process.stop(self.grace);
            debug!(?outcome, "track stopped");
        }
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        self.stop_all();
    }
}
