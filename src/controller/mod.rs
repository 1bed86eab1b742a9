//! Playback state machine: silence, ring, play, repeat.
//!
//! | State   | Each tick                                  | Leaves when                      |
//! |---------|--------------------------------------------|----------------------------------|
//! | Silent  | drop button presses                        | deadline passed -> Ringing       |
//! | Ringing | restart a dead ring player, watch button   | press consumed -> Playing        |
//! | Playing | drop button presses, poll the track player | track exited -> advance, Silent  |

#[cfg(test)]
mod tests;

use crate::input::InputMerger;
use crate::player::{PlayerControl, TrackStatus};
use crate::pointer::PointerStore;
use crate::rotation::Rotation;
use rand::Rng;
use std::{
    fmt,
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

/// Minimum spacing between restarts of a crashed ring player.
pub const RING_RESTART_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Silent,
    Ringing,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlaybackState::Silent => "SILENT",
            PlaybackState::Ringing => "RINGING",
            PlaybackState::Playing => "PLAYING",
        })
    }
}

pub struct Controller<P, R> {
    rotation: Rotation,
    audio_dir: PathBuf,
    store: PointerStore,
    players: P,
    rng: R,
    state: PlaybackState,
    pointer: usize,
    silence_deadline: Instant,
    last_ring_start: Option<Instant>,
    ring_restarts: u64,
    completed_tracks: u64,
}

impl<P: PlayerControl, R: Rng> Controller<P, R> {
    /// Resume from the persisted pointer and enter `Silent`.
    pub fn new(
        rotation: Rotation,
        audio_dir: impl Into<PathBuf>,
        store: PointerStore,
        players: P,
        rng: R,
        now: Instant,
    ) -> Self {
        let pointer = store.load(rotation.len());
        info!(
            pointer,
            track = %rotation.get(pointer).file,
            tracks = rotation.len(),
            "resuming rotation"
        );
        let mut controller = Self {
            rotation,
            audio_dir: audio_dir.into(),
            store,
            players,
            rng,
            state: PlaybackState::Silent,
            pointer,
            silence_deadline: now,
            last_ring_start: None,
            ring_restarts: 0,
            completed_tracks: 0,
        };
        controller.enter_silent(now);
        controller
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn silence_deadline(&self) -> Instant {
        self.silence_deadline
    }

    pub fn ring_restarts(&self) -> u64 {
        self.ring_restarts
    }

    pub fn completed_tracks(&self) -> u64 {
        self.completed_tracks
    }

    pub fn players(&self) -> &P {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut P {
        &mut self.players
    }

    /// Run one state's tick behaviour and return the resulting state.
    pub fn tick(&mut self, now: Instant, input: &InputMerger) -> PlaybackState {
        match self.state {
            PlaybackState::Silent => self.tick_silent(now, input),
            PlaybackState::Ringing => self.tick_ringing(now, input),
            PlaybackState::Playing => self.tick_playing(now, input),
        }
        self.state
    }

    /// Stop the player that belongs to the current state.
    pub fn stop_active(&mut self) {
        match self.state {
            PlaybackState::Silent => {}
            PlaybackState::Ringing => {
                info!("stopping ring for shutdown");
                self.players.stop_ring();
            }
            PlaybackState::Playing => {
                info!("stopping track for shutdown");
                self.players.stop_track();
            }
        }
    }

    fn tick_silent(&mut self, now: Instant, input: &InputMerger) {
        input.discard();
        if now < self.silence_deadline {
            return;
        }
        self.transition(PlaybackState::Ringing);
        self.start_ring(now);
    }

    fn tick_ringing(&mut self, now: Instant, input: &InputMerger) {
        if input.consume() {
            info!("button pressed; answering");
            self.players.stop_ring();
            self.last_ring_start = None;
            let entry = self.rotation.get(self.pointer);
            let path = self.audio_dir.join(&entry.file);
            info!(pointer = self.pointer, file = %entry.file, "playing track");
            self.transition(PlaybackState::Playing);
            self.players.start_track(&path);
            return;
        }
        if self.players.ring_alive() {
            return;
        }
        let backoff_elapsed = self
            .last_ring_start
            .map_or(true, |at| now.saturating_duration_since(at) >= RING_RESTART_BACKOFF);
        if backoff_elapsed {
            self.ring_restarts += 1;
            warn!(restarts = self.ring_restarts, "ring player not running; restarting");
            self.start_ring(now);
        }
    }

    fn tick_playing(&mut self, now: Instant, input: &InputMerger) {
        input.discard();
        let status = self.players.track_status();
        let file = &self.rotation.get(self.pointer).file;
        match status {
            TrackStatus::Running => return,
            TrackStatus::ExitedOk => info!(file = %file, "track finished"),
            TrackStatus::ExitedError(Some(code)) => {
                warn!(file = %file, code, "track player failed; advancing anyway")
            }
            TrackStatus::ExitedError(None) => {
                warn!(file = %file, "track player did not run or was killed; advancing anyway")
            }
        }
        self.completed_tracks += 1;
        self.advance_pointer();
        self.enter_silent(now);
    }

    fn advance_pointer(&mut self) {
        self.pointer = self.rotation.next_index(self.pointer);
        match self.store.save(self.pointer) {
            Ok(()) => info!(pointer = self.pointer, "rotation pointer saved"),
            Err(err) => error!(
                pointer = self.pointer,
                path = %self.store.path().display(),
                "failed to save rotation pointer, continuing in memory: {err}"
            ),
        }
    }

    fn enter_silent(&mut self, now: Instant) {
        let entry = self.rotation.get(self.pointer);
        let silence = entry.draw_silence(&mut self.rng);
        let next = entry.file.clone();
        self.silence_deadline = now.checked_add(silence).unwrap_or_else(|| {
            warn!(silence_secs = silence.as_secs(), "silence does not fit the clock; ringing now");
            now
        });
        if self.state != PlaybackState::Silent {
            self.transition(PlaybackState::Silent);
        }
        info!(silence_secs = silence.as_secs(), next = %next, "silent until next ring");
    }

    fn start_ring(&mut self, now: Instant) {
        self.last_ring_start = Some(now);
        if let Err(err) = self.players.start_ring() {
            error!("{err:#}");
        }
    }

    fn transition(&mut self, next: PlaybackState) {
        info!(from = %self.state, to = %next, "state change");
        self.state = next;
    }
}
