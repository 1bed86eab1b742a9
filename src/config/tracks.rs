use crate::rotation::{TrackEntry, MAX_SILENCE_MINUTES};
use anyhow::{bail, Context, Result};
use std::{fs, path::Path};

/// Read a track table from JSON, or YAML when the extension is `.yaml`/`.yml`.
///
/// The file is an array of `{ file, silence_min, silence_max }` records.
pub fn load_track_table(path: &Path) -> Result<Vec<TrackEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read track table {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    let entries: Vec<TrackEntry> = if is_yaml {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML track table {}", path.display()))?
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JSON track table {}", path.display()))?
    };
    validate_track_table(&entries)?;
    Ok(entries)
}

/// Installation tables need at least one track and silences that are strictly
/// positive and at most a week long.
pub fn validate_track_table(entries: &[TrackEntry]) -> Result<()> {
    if entries.is_empty() {
        bail!("track table is empty");
    }
    for (index, entry) in entries.iter().enumerate() {
        if entry.file.trim().is_empty() {
            bail!("track {index} has an empty file name");
        }
        if !(entry.silence_min > 0.0 && entry.silence_max > 0.0) {
            bail!(
                "track {index} ({}) silence bounds must be positive, got {}..{}",
                entry.file,
                entry.silence_min,
                entry.silence_max
            );
        }
        if entry.silence_min > entry.silence_max {
            bail!(
                "track {index} ({}) silence_min {} exceeds silence_max {}",
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
    Ok(())
}
