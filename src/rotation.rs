//! The fixed, ordered list of tracks answered one per ring.

use anyhow::{bail, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest silence window a track may ask for (one week, in minutes).
pub const MAX_SILENCE_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// One entry of the rotation: an audio file plus the silence window (minutes)
/// that precedes its ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub file: String,
    pub silence_min: f64,
    pub silence_max: f64,
}

impl TrackEntry {
    pub fn new(file: impl Into<String>, silence_min: f64, silence_max: f64) -> Self {
        Self {
            file: file.into(),
            silence_min,
            silence_max,
        }
    }

    /// Draw a silence duration uniformly from `[silence_min, silence_max]` minutes.
    pub fn draw_silence<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let minutes = if self.silence_max > self.silence_min {
            rng.gen_range(self.silence_min..=self.silence_max)
        } else {
            self.silence_min
        };
        let ceiling = Duration::from_secs((MAX_SILENCE_MINUTES * 60.0) as u64);
        Duration::try_from_secs_f64((minutes * 60.0).max(0.0))
            .map_or(ceiling, |silence| silence.min(ceiling))
    }
}

/// Immutable, non-empty sequence of tracks.
#[derive(Debug, Clone)]
pub struct Rotation {
    entries: Vec<TrackEntry>,
}

impl Rotation {
    pub fn new(entries: Vec<TrackEntry>) -> Result<Self> {
        if entries.is_empty() {
            bail!("rotation must contain at least one track");
        }
        for (index, entry) in entries.iter().enumerate() {
            if entry.file.trim().is_empty() {
                bail!("track {index} has an empty file name");
            }
            if !entry.silence_min.is_finite() || !entry.silence_max.is_finite() {
                bail!("track {index} ({}) has a non-finite silence range", entry.file);
            }
            if entry.silence_min < 0.0 || entry.silence_min > entry.silence_max {
                bail!(
                    "track {index} ({}) has an invalid silence range {}..{}",
                    entry.file,
                    entry.silence_min,
                    entry.silence_max
                );
            }
            if entry.silence_max > MAX_SILENCE_MINUTES {
                bail!(
                    "track {index} ({}) silence_max {} exceeds {MAX_SILENCE_MINUTES} minutes",
                    entry.file,
                    entry.silence_max
                );
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true for a constructed rotation.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`, wrapping out-of-range values back into the rotation.
    pub fn get(&self, index: usize) -> &TrackEntry {
        &self.entries[index % self.entries.len()]
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_empty_rotation() {
        assert!(Rotation::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_inverted_silence_range() {
        let err = Rotation::new(vec![TrackEntry::new("01.mp3", 5.0, 2.0)]).unwrap_err();
        assert!(err.to_string().contains("invalid silence range"));
    }

    #[test]
    fn rejects_blank_file_name() {
        assert!(Rotation::new(vec![TrackEntry::new("  ", 1.0, 2.0)]).is_err());
    }

    #[test]
    fn next_index_wraps() {
        let rotation = Rotation::new(vec![
            TrackEntry::new("01.mp3", 1.0, 1.0),
            TrackEntry::new("02.mp3", 1.0, 1.0),
            TrackEntry::new("03.mp3", 1.0, 1.0),
        ])
        .unwrap();
        assert_eq!(rotation.next_index(0), 1);
        assert_eq!(rotation.next_index(2), 0);
        assert_eq!(rotation.get(4).file, "02.mp3");
    }

    #[test]
    fn draw_silence_stays_inside_window() {
        let entry = TrackEntry::new("01.mp3", 15.0, 20.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let secs = entry.draw_silence(&mut rng).as_secs_f64();
            assert!((900.0..=1200.0).contains(&secs), "drew {secs}");
        }
    }

    #[test]
    fn rejects_silence_longer_than_a_week() {
        let err = Rotation::new(vec![TrackEntry::new("01.mp3", 1e300, 1e300)]).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert!(Rotation::new(vec![TrackEntry::new("01.mp3", 1.0, MAX_SILENCE_MINUTES)]).is_ok());
    }

    #[test]
    fn oversized_entry_draws_at_most_a_week() {
        let entry = TrackEntry::new("01.mp3", 1e300, 1e300);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            entry.draw_silence(&mut rng),
            Duration::from_secs(7 * 24 * 60 * 60)
        );
    }

    #[test]
    fn zero_window_draws_zero() {
        let entry = TrackEntry::new("01.mp3", 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(entry.draw_silence(&mut rng), Duration::ZERO);
    }
}
