use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::{
    fs,
    io::{self, Write},
    panic,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};
use tracing_subscriber::fmt::{
    time::UtcTime,
    writer::{BoxMakeWriter, MakeWriterExt},
};

/// Size at which the log file is rotated.
pub const LOG_MAX_BYTES: u64 = 1024 * 1024;
/// Number of numbered backups kept next to the live log.
pub const LOG_BACKUPS: usize = 2;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Append-only log file that rolls over to `<path>.1`, `<path>.2`, ...
pub struct RotatingLogWriter {
    path: PathBuf,
    file: fs::File,
    max_bytes: u64,
    backups: usize,
    bytes_written: u64,
}

impl RotatingLogWriter {
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            path,
            file,
            max_bytes,
            backups,
            bytes_written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.backups == 0 {
            self.file = fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
            self.file = open_append(&self.path)?;
        }
        self.bytes_written = 0;
        Ok(())
    }
}

impl Write for RotatingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.bytes_written > 0
            && self.bytes_written.saturating_add(buf.len() as u64) > self.max_bytes
        {
            // A failed rotation keeps appending to the current file.
            let _ = self.rotate();
        }
        let written = self.file.write(buf)?;
        self.bytes_written = self.bytes_written.saturating_add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global tracing subscriber described by the CLI flags.
///
/// Does nothing when both the log file and stderr are disabled, or when a
/// subscriber was already installed.
pub fn init_logging(config: &AppConfig) -> Result<()> {
    let writer = match (config.no_logs, config.log_stderr) {
        (true, false) => return Ok(()),
        (true, true) => BoxMakeWriter::new(io::stderr),
        (false, stderr) => {
            let file = RotatingLogWriter::open(&config.log_file, LOG_MAX_BYTES, LOG_BACKUPS)
                .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;
            if stderr {
                BoxMakeWriter::new(Mutex::new(file).and(io::stderr))
            } else {
                BoxMakeWriter::new(Mutex::new(file))
            }
        }
    };

    let level = config.log_level.filter();
    TRACING_INIT.get_or_init(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_timer(UtcTime::rfc_3339())
            .with_ansi(false)
            .with_target(false)
            .with_max_level(level)
            .with_writer(writer)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
    Ok(())
}

/// Record a panic with its location. Called from the panic hook.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    let payload = if let Some(text) = info.payload().downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = info.payload().downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    };
    tracing::error!(
        %location,
        version = env!("CARGO_PKG_VERSION"),
        "panic: {payload}"
    );
}
