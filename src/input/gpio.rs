use super::{ButtonSignal, ButtonSource};
use anyhow::{bail, Context, Result};
use std::{
    fs,
    io::{self, Read, Seek, SeekFrom},
    os::fd::AsRawFd,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

/// How long the edge watcher blocks in `poll` before re-checking its stop flag.
const EDGE_POLL_TIMEOUT_MS: libc::c_int = 200;
const SYSFS_SETTLE_ATTEMPTS: u32 = 20;
const SYSFS_SETTLE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct GpioConfig {
    /// Usually `/sys/class/gpio`.
    pub root: PathBuf,
    /// Pin number on the SoC (BCM numbering on a Raspberry Pi).
    pub pin: u32,
    /// Sysfs number of the chip's first line. Detected when `None`.
    pub base: Option<u32>,
    pub debounce: Duration,
}

/// Accepts at most one press per debounce window.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }
}

/// Falling-edge button on a sysfs GPIO line.
pub struct GpioButton {
    root: PathBuf,
    line: u32,
    exported_here: bool,
    stop: Arc<AtomicBool>,
    watcher: Option<thread::JoinHandle<()>>,
}

impl GpioButton {
    pub fn open(config: &GpioConfig, signal: ButtonSignal) -> Result<Self> {
        let root = config.root.as_path();
        if !root.join("export").exists() {
            bail!("GPIO sysfs interface not present at {}", root.display());
        }
        let base = config
            .base
            .unwrap_or_else(|| detect_chip_base(root, config.pin));
        let Some(line) = base.checked_add(config.pin) else {
            bail!("GPIO chip base {base} plus pin {} is out of range", config.pin);
        };
        let line_dir = root.join(format!("gpio{line}"));

        let mut exported_here = false;
        if !line_dir.exists() {
            fs::write(root.join("export"), line.to_string())
                .with_context(|| format!("failed to export GPIO line {line}"))?;
            exported_here = true;
        }

        let mut value = match configure_line(&line_dir) {
            Ok(value) => value,
            Err(err) => {
                if exported_here {
                    unexport(root, line);
                }
                return Err(err);
            }
        };
        let _ = read_level(&mut value);

        let stop = Arc::new(AtomicBool::new(false));
        let watcher = {
            let stop = stop.clone();
            let debounce = Debounce::new(config.debounce);
            thread::Builder::new()
                .name("gpio-button".to_string())
                .spawn(move || watch_edges(value, signal, stop, debounce))
                .context("failed to spawn GPIO watcher thread")?
        };

        info!(
            pin = config.pin,
            line,
            debounce_ms = config.debounce.as_millis() as u64,
            "hardware button armed on falling edge (pull-up bias comes from board config)"
        );
        Ok(Self {
            root: root.to_path_buf(),
            line,
            exported_here,
            stop,
            watcher: Some(watcher),
        })
    }
}

impl ButtonSource for GpioButton {
    fn label(&self) -> &'static str {
        "gpio"
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.watcher.take() {
            if handle.join().is_err() {
                warn!("GPIO watcher thread panicked");
            }
        }
        if self.exported_here {
            self.exported_here = false;
            unexport(&self.root, self.line);
        }
    }
}

impl Drop for GpioButton {
    fn drop(&mut self) {
        self.release();
    }
}

/// Wait for the line directory, switch it to a falling-edge input and open its
/// `value` file.
fn configure_line(line_dir: &Path) -> Result<fs::File> {
    if !wait_for(|| line_dir.exists()) {
        bail!("GPIO line directory {} did not appear", line_dir.display());
    }
    // udev may still be fixing permissions on a freshly exported line.
    write_settled(&line_dir.join("direction"), "in")?;
    write_settled(&line_dir.join("edge"), "falling")?;
    fs::File::open(line_dir.join("value"))
        .with_context(|| format!("failed to open {}", line_dir.join("value").display()))
}

fn unexport(root: &Path, line: u32) {
    if let Err(err) = fs::write(root.join("unexport"), line.to_string()) {
        warn!(line, "failed to unexport GPIO line: {err}");
    } else {
        debug!(line, "GPIO line unexported");
    }
}

fn watch_edges(
    mut value: fs::File,
    signal: ButtonSignal,
    stop: Arc<AtomicBool>,
    mut debounce: Debounce,
) {
    let fd = value.as_raw_fd();
    while !stop.load(Ordering::SeqCst) {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLPRI | libc::POLLERR,
            revents: 0,
        };
        // SAFETY: pfd points at one valid pollfd for the duration of the call and
        // fd stays open because `value` outlives the loop.
        let ret = unsafe { libc::poll(&mut pfd, 1, EDGE_POLL_TIMEOUT_MS) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            warn!("GPIO poll failed, hardware button disabled: {err}");
            return;
        }
        if ret == 0 {
            continue;
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            warn!("GPIO value descriptor became invalid, hardware button disabled");
            return;
        }
        if pfd.revents & (libc::POLLPRI | libc::POLLERR) == 0 {
            continue;
        }
        // Reading re-arms the edge notification.
        let level = read_level(&mut value);
        if debounce.accept(Instant::now()) {
            debug!(?level, "hardware button press");
            signal.raise();
        }
    }
}

fn read_level(value: &mut fs::File) -> Option<u8> {
    let mut buf = [0u8; 4];
    value.seek(SeekFrom::Start(0)).ok()?;
    match value.read(&mut buf) {
        Ok(n) if n > 0 => Some(buf[0]),
        _ => None,
    }
}

fn wait_for(mut ready: impl FnMut() -> bool) -> bool {
    for _ in 0..SYSFS_SETTLE_ATTEMPTS {
        if ready() {
            return true;
        }
        thread::sleep(SYSFS_SETTLE_DELAY);
    }
    ready()
}

fn write_settled(path: &Path, contents: &str) -> Result<()> {
    let mut last_err = None;
    for _ in 0..SYSFS_SETTLE_ATTEMPTS {
        match fs::write(path, contents) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                last_err = Some(err);
                thread::sleep(SYSFS_SETTLE_DELAY);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to write {}", path.display()))
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::PermissionDenied)))
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Find the sysfs base number of the SoC pin controller.
///
/// Newer kernels number the Raspberry Pi header lines from a non-zero base
/// (e.g. 512). Prefers a `pinctrl-*` chip large enough to hold `pin`, then any
/// chip large enough, then 0.
pub fn detect_chip_base(root: &Path, pin: u32) -> u32 {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };
    let mut fallback: Option<u32> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with("gpiochip") {
            continue;
        }
        let dir = entry.path();
        let read_u32 = |file: &str| -> Option<u32> {
            fs::read_to_string(dir.join(file)).ok()?.trim().parse().ok()
        };
        let (Some(base), Some(ngpio)) = (read_u32("base"), read_u32("ngpio")) else {
            continue;
        };
        if pin >= ngpio {
            continue;
        }
        let label = fs::read_to_string(dir.join("label")).unwrap_or_default();
        if label.trim().starts_with("pinctrl-") {
            return base;
        }
        fallback = Some(fallback.map_or(base, |current| current.min(base)));
    }
    fallback.unwrap_or(0)
}
