//! Durable storage of the rotation pointer ("which track plays next").
//!
//! The value is a plain decimal index. Saves go to a sibling `.tmp` file which is
//! synced and then renamed over the canonical path, so a crash leaves either the
//! old value or the new one. A `.tmp` left behind by an interrupted save is
//! deleted on the next load without being read.

use std::{
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PointerStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl PointerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp: OsString = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Read the persisted index, falling back to 0 when the file is absent,
    /// unparsable, or outside `[0, len)`.
    pub fn load(&self, len: usize) -> usize {
        self.discard_stale_tmp();
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved pointer; starting at 0");
                return 0;
            }
            Err(err) => {
                warn!(path = %self.path.display(), "failed to read pointer file: {err}");
                return 0;
            }
        };
        match raw.trim().parse::<usize>() {
            Ok(index) if index < len => index,
            Ok(index) => {
                warn!("saved pointer {index} is outside 0..{len}; resetting to 0");
                0
            }
            Err(_) => {
                warn!("saved pointer {:?} is not a number; resetting to 0", raw.trim());
                0
            }
        }
    }

    /// Persist `index` atomically. Errors are returned so the caller can log and
    /// keep the in-memory value.
    pub fn save(&self, index: usize) -> io::Result<()> {
        {
            let mut file = fs::File::create(&self.tmp_path)?;
            file.write_all(index.to_string().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&self.tmp_path, &self.path)?;
        sync_parent_dir(&self.path);
        Ok(())
    }

    fn discard_stale_tmp(&self) {
        match fs::remove_file(&self.tmp_path) {
            Ok(()) => warn!(
                path = %self.tmp_path.display(),
                "discarded leftover pointer temp file from an interrupted save"
            ),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.tmp_path.display(),
                "failed to remove leftover pointer temp file: {err}"
            ),
        }
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    if let Err(err) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
        debug!("directory fsync after pointer rename failed: {err}");
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
