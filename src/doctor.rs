//! Startup checks and the `--doctor` report.

use crate::config::AppConfig;
use crate::input::detect_chip_base;
use crate::player::PlayerCommand;
use crate::rotation::Rotation;
use anyhow::{bail, Result};
use std::{
    env,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

pub struct DoctorReport {
    lines: Vec<String>,
}

impl DoctorReport {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![title.to_string()],
        }
    }

    pub fn section(&mut self, title: &str) {
        self.lines.push(String::new());
        self.lines.push(format!("{title}:"));
    }

    pub fn push_kv(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("  {key}: {value}"));
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// Non-fatal findings from [`preflight`].
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub ring_program: PathBuf,
    pub track_program: PathBuf,
    pub missing_tracks: Vec<PathBuf>,
}

/// Locate `program` the way `Command` would: paths are checked directly,
/// bare names are searched on `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    let search = env::var_os("PATH")?;
    env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn require_program(flag: &str, command: &PlayerCommand) -> Result<PathBuf> {
    match resolve_program(command.program()) {
        Some(path) => Ok(path),
        None => bail!(
            "{flag} player `{}` not found or not executable",
            command.program()
        ),
    }
}

/// Check that both players and the ring file exist. Missing track files are
/// collected, not fatal: their turn fails like any other track error.
pub fn preflight(config: &AppConfig, rotation: &Rotation) -> Result<PreflightReport> {
    let ring_program = require_program("--ring-cmd", &config.ring_command()?)?;
    let track_program = require_program("--track-cmd", &config.track_command()?)?;
    if !config.ring_path().is_file() {
        bail!("ring file {} does not exist", config.ring_path().display());
    }
    let missing_tracks = rotation
        .iter()
        .map(|entry| config.track_path(entry))
        .filter(|path| !path.is_file())
        .collect();
    Ok(PreflightReport {
        ring_program,
        track_program,
        missing_tracks,
    })
}

/// Everything an installer wants to see before leaving the box alone.
pub fn doctor_report(config: &AppConfig) -> DoctorReport {
    let mut report = DoctorReport::new("Conch Doctor");
    report.push_kv("version", env!("CARGO_PKG_VERSION"));
    report.push_kv("os", format!("{}/{}", env::consts::OS, env::consts::ARCH));

    report.section("Paths");
    if let Some(base) = &config.base_dir {
        report.push_kv("base_dir", base.display());
    }
    report.push_kv("audio_dir", config.audio_dir.display());
    report.push_kv("ring_file", file_status(config.ring_path()));
    report.push_kv("state_file", config.state_file.display());
    report.push_kv(
        "log_file",
        if config.no_logs {
            "disabled".to_string()
        } else {
            config.log_file.display().to_string()
        },
    );

    report.section("Players");
    for (key, raw) in [("ring_cmd", &config.ring_cmd), ("track_cmd", &config.track_cmd)] {
        match PlayerCommand::parse(raw) {
            Ok(command) => {
                report.push_kv(key, raw);
                let found = resolve_program(command.program())
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "NOT FOUND".to_string());
                report.push_kv(&format!("{key}_program"), found);
            }
            Err(err) => report.push_kv(key, format!("error: {err:#}")),
        }
    }

    report.section("Rotation");
    match config.load_rotation() {
        Ok(rotation) => {
            report.push_kv(
                "source",
                config
                    .tracks
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "built-in".to_string()),
            );
            report.push_kv("tracks", rotation.len());
            let saved = fs::read_to_string(&config.state_file)
                .map(|raw| raw.trim().to_string())
                .unwrap_or_else(|_| "none".to_string());
            report.push_kv("saved_pointer", saved);
            let missing: Vec<_> = rotation
                .iter()
                .filter(|entry| !config.track_path(entry).is_file())
                .map(|entry| entry.file.as_str())
                .collect();
            if missing.is_empty() {
                report.push_kv("track_files", "all present");
            } else {
                report.push_kv("track_files", format!("{} missing", missing.len()));
                for file in missing {
                    report.push_line(format!("    - {file}"));
                }
            }
        }
        Err(err) => report.push_kv("error", format!("{err:#}")),
    }

    report.section("Button");
    if config.no_gpio {
        report.push_kv("gpio", "disabled (--no-gpio)");
    } else if config.gpio_root.join("export").exists() {
        let base = config
            .gpio_base
            .unwrap_or_else(|| detect_chip_base(&config.gpio_root, config.button_pin));
        report.push_kv("gpio", "sysfs available");
        report.push_kv("pin", config.button_pin);
        match base.checked_add(config.button_pin) {
            Some(line) => report.push_kv("line", line),
            None => report.push_kv("line", format!("error: base {base} + pin overflows")),
        }
        report.push_kv("debounce_ms", config.debounce_ms);
    } else {
        report.push_kv(
            "gpio",
            format!("unavailable ({} missing), keyboard only", config.gpio_root.display()),
        );
    }

    report
}

fn file_status(path: &Path) -> String {
    if path.is_file() {
        path.display().to_string()
    } else {
        format!("{} (MISSING)", path.display())
    }
}
