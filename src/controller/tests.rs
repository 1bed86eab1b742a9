use super::{Controller, PlaybackState, RING_RESTART_BACKOFF};
use crate::input::{ButtonSignal, InputMerger};
use crate::player::{PlayerControl, TrackStatus};
use crate::pointer::PointerStore;
use crate::rotation::{Rotation, TrackEntry, MAX_SILENCE_MINUTES};
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Scripted stand-in for the process supervisor.
#[derive(Default)]
struct FakePlayers {
    ring_live: bool,
    ring_starts: usize,
    ring_stops: usize,
    fail_ring_start: bool,
    track_live: bool,
    tracks_started: Vec<PathBuf>,
    track_stops: usize,
    /// Statuses returned by successive `track_status` calls; `Running` once empty.
    script: VecDeque<TrackStatus>,
}

impl FakePlayers {
    fn crash_ring(&mut self) {
        self.ring_live = false;
    }

    fn finish_track(&mut self, status: TrackStatus) {
        self.script.push_back(status);
    }
}

impl PlayerControl for FakePlayers {
    fn start_ring(&mut self) -> Result<()> {
        if self.ring_live {
            bail!("ring player already running");
        }
        if self.fail_ring_start {
            bail!("no player");
        }
        self.ring_live = true;
        self.ring_starts += 1;
        Ok(())
    }

    fn ring_alive(&mut self) -> bool {
        self.ring_live
    }

    fn stop_ring(&mut self) {
        if self.ring_live {
            self.ring_stops += 1;
        }
        self.ring_live = false;
    }

    fn start_track(&mut self, file: &Path) {
        self.track_live = true;
        self.tracks_started.push(file.to_path_buf());
    }

    fn track_status(&mut self) -> TrackStatus {
        match self.script.pop_front() {
            Some(status) => {
                if !status.is_running() {
                    self.track_live = false;
                }
                status
            }
            None => TrackStatus::Running,
        }
    }

    fn stop_track(&mut self) {
        if self.track_live {
            self.track_stops += 1;
        }
        self.track_live = false;
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: PointerStore,
    input: InputMerger,
    controller: Controller<FakePlayers, StdRng>,
    now: Instant,
}

impl Harness {
    fn new(entries: Vec<TrackEntry>, saved_pointer: Option<usize>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = PointerStore::new(dir.path().join("track_state.txt"));
        if let Some(pointer) = saved_pointer {
            store.save(pointer).unwrap();
        }
        let now = Instant::now();
        let controller = Controller::new(
            Rotation::new(entries).unwrap(),
            "/audio",
            store.clone(),
            FakePlayers::default(),
            StdRng::seed_from_u64(42),
            now,
        );
        Self {
            _dir: dir,
            store,
            input: InputMerger::new(ButtonSignal::new()),
            controller,
            now,
        }
    }

    fn zero_silence(n: usize, saved_pointer: Option<usize>) -> Self {
        let entries = (0..n)
            .map(|i| TrackEntry::new(format!("{:02}.mp3", i + 1), 0.0, 0.0))
            .collect();
        Self::new(entries, saved_pointer)
    }

    fn tick(&mut self) -> PlaybackState {
        self.controller.tick(self.now, &self.input)
    }

    fn advance(&mut self, by: Duration) -> PlaybackState {
        self.now += by;
        self.tick()
    }

    fn press(&self) {
        self.input.signal().raise();
    }

    fn players(&mut self) -> &mut FakePlayers {
        self.controller.players_mut()
    }

    fn saved_pointer(&self) -> String {
        fs::read_to_string(self.store.path()).unwrap()
    }
}

#[test]
fn starts_silent_at_saved_pointer() {
    let harness = Harness::zero_silence(3, Some(2));
    assert_eq!(harness.controller.state(), PlaybackState::Silent);
    assert_eq!(harness.controller.pointer(), 2);
}

#[test]
fn presses_during_silence_are_ignored_until_deadline() {
    let mut harness = Harness::new(vec![TrackEntry::new("01.mp3", 1.0, 1.0)], None);
    assert_eq!(
        harness.controller.silence_deadline(),
        harness.now + Duration::from_secs(60)
    );
    for _ in 0..50 {
        harness.press();
        assert_eq!(harness.advance(Duration::from_millis(100)), PlaybackState::Silent);
        assert!(!harness.input.poll(), "press must be discarded while silent");
    }
    assert_eq!(harness.players().ring_starts, 0);
    harness.now = harness.controller.silence_deadline();
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    assert_eq!(harness.players().ring_starts, 1);
}

#[test]
fn press_queued_before_ring_does_not_answer_it() {
    let mut harness = Harness::zero_silence(2, None);
    harness.press();
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    assert!(harness.players().tracks_started.is_empty());
}

#[test]
fn many_raises_answer_exactly_once() {
    let mut harness = Harness::zero_silence(2, None);
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    harness.press();
    harness.press();
    harness.press();
    assert_eq!(harness.tick(), PlaybackState::Playing);
    assert_eq!(harness.tick(), PlaybackState::Playing);
    let players = harness.players();
    assert_eq!(players.tracks_started.len(), 1);
    assert_eq!(players.ring_stops, 1);
    assert!(!players.ring_live);
    assert!(!harness.input.poll());
}

#[test]
fn crashed_ring_restarts_in_place_and_keeps_pending_press() {
    let mut harness = Harness::zero_silence(2, None);
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    harness.players().crash_ring();
    assert_eq!(harness.advance(RING_RESTART_BACKOFF), PlaybackState::Ringing);
    assert!(harness.players().ring_live);
    assert_eq!(harness.players().ring_starts, 2);
    assert_eq!(harness.controller.ring_restarts(), 1);

    // A press that arrives while the ring is dead is still honoured.
    harness.players().crash_ring();
    harness.press();
    assert_eq!(harness.advance(Duration::from_millis(100)), PlaybackState::Playing);
}

#[test]
fn ring_restart_is_rate_limited() {
    let mut harness = Harness::zero_silence(1, None);
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    harness.players().crash_ring();
    harness.players().fail_ring_start = true;
    for _ in 0..5 {
        harness.advance(Duration::from_millis(100));
    }
    // One attempt right after the backoff from the initial start, not one per tick.
    assert_eq!(harness.controller.ring_restarts(), 0);
    harness.advance(RING_RESTART_BACKOFF);
    assert_eq!(harness.controller.ring_restarts(), 1);
    harness.advance(Duration::from_millis(100));
    assert_eq!(harness.controller.ring_restarts(), 1);
    harness.players().fail_ring_start = false;
    harness.advance(RING_RESTART_BACKOFF);
    assert_eq!(harness.controller.ring_restarts(), 2);
    assert!(harness.players().ring_live);
    assert_eq!(harness.controller.state(), PlaybackState::Ringing);
}

#[test]
fn presses_during_playback_are_dropped() {
    let mut harness = Harness::zero_silence(2, None);
    harness.tick();
    harness.press();
    assert_eq!(harness.tick(), PlaybackState::Playing);
    harness.press();
    assert_eq!(harness.tick(), PlaybackState::Playing);
    assert!(!harness.input.poll());
    assert_eq!(harness.players().tracks_started.len(), 1);
}

#[test]
fn end_to_end_two_tracks() {
    let mut harness = Harness::zero_silence(2, None);
    assert_eq!(harness.controller.pointer(), 0);
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    harness.press();
    assert_eq!(harness.tick(), PlaybackState::Playing);
    assert_eq!(
        harness.players().tracks_started,
        vec![PathBuf::from("/audio/01.mp3")]
    );
    harness.players().finish_track(TrackStatus::ExitedOk);
    assert_eq!(harness.tick(), PlaybackState::Silent);
    assert_eq!(harness.controller.pointer(), 1);
    assert_eq!(harness.saved_pointer(), "1");
    assert_eq!(harness.controller.completed_tracks(), 1);
}

#[test]
fn failed_track_advances_like_a_finished_one() {
    for status in [TrackStatus::ExitedError(Some(1)), TrackStatus::ExitedError(None)] {
        let mut harness = Harness::zero_silence(3, Some(1));
        harness.tick();
        harness.press();
        harness.tick();
        assert_eq!(
            harness.players().tracks_started,
            vec![PathBuf::from("/audio/02.mp3")]
        );
        harness.players().finish_track(status);
        assert_eq!(harness.tick(), PlaybackState::Silent);
        assert_eq!(harness.controller.pointer(), 2);
        assert_eq!(harness.saved_pointer(), "2");
    }
}

#[test]
fn pointer_wraps_after_last_track() {
    let mut harness = Harness::zero_silence(3, Some(2));
    harness.tick();
    harness.press();
    harness.tick();
    harness.players().finish_track(TrackStatus::ExitedOk);
    harness.tick();
    assert_eq!(harness.controller.pointer(), 0);
    assert_eq!(harness.saved_pointer(), "0");
}

#[test]
fn track_keeps_playing_until_it_exits() {
    let mut harness = Harness::zero_silence(2, None);
    harness.tick();
    harness.press();
    harness.tick();
    for _ in 0..10 {
        assert_eq!(harness.advance(Duration::from_secs(30)), PlaybackState::Playing);
    }
    assert_eq!(harness.controller.pointer(), 0);
}

#[test]
fn save_failure_keeps_in_memory_pointer() {
    let mut harness = Harness::zero_silence(2, None);
    // Replace the state file's directory entry with a directory so rename fails.
    fs::create_dir_all(harness.store.path()).unwrap();
    harness.tick();
    harness.press();
    harness.tick();
    harness.players().finish_track(TrackStatus::ExitedOk);
    assert_eq!(harness.tick(), PlaybackState::Silent);
    assert_eq!(harness.controller.pointer(), 1);

    // The loop carries on into the next cycle.
    assert_eq!(harness.tick(), PlaybackState::Ringing);
    harness.press();
    harness.tick();
    assert_eq!(
        harness.players().tracks_started.last(),
        Some(&PathBuf::from("/audio/02.mp3"))
    );
}

#[test]
fn next_silence_uses_the_next_tracks_window() {
    let mut harness = Harness::new(
        vec![
            TrackEntry::new("01.mp3", 0.0, 0.0),
            TrackEntry::new("02.mp3", 2.0, 2.0),
        ],
        None,
    );
    harness.tick();
    harness.press();
    harness.tick();
    harness.players().finish_track(TrackStatus::ExitedOk);
    harness.tick();
    assert_eq!(
        harness.controller.silence_deadline(),
        harness.now + Duration::from_secs(120)
    );
}

#[test]
fn stop_active_targets_current_role() {
    let mut harness = Harness::zero_silence(2, None);
    harness.controller.stop_active();
    assert_eq!(harness.players().ring_stops, 0);

    harness.tick();
    harness.controller.stop_active();
    assert_eq!(harness.players().ring_stops, 1);

    let mut harness = Harness::zero_silence(2, None);
    harness.tick();
    harness.press();
    harness.tick();
    harness.controller.stop_active();
    assert_eq!(harness.players().track_stops, 1);
}

#[test]
fn week_long_silence_sets_a_distant_deadline() {
    let harness = Harness::new(
        vec![TrackEntry::new("01.mp3", MAX_SILENCE_MINUTES, MAX_SILENCE_MINUTES)],
        None,
    );
    assert_eq!(
        harness.controller.silence_deadline(),
        harness.now + Duration::from_secs(7 * 24 * 60 * 60)
    );
    assert_eq!(harness.controller.state(), PlaybackState::Silent);
}
