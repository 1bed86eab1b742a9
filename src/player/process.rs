use super::PlayerCommand;
use std::{
    fmt, io,
    path::Path,
    process::{Child, ExitStatus},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Ring,
    Track,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Ring => "ring",
            Role::Track => "track",
        })
    }
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process had already exited before the stop request.
    AlreadyExited,
    /// Exited within the grace period after SIGTERM.
    Terminated,
    /// Still running after the grace period; SIGKILL was sent.
    Killed,
}

/// One live player process.
pub struct PlayerProcess {
    role: Role,
    child: Child,
}

impl PlayerProcess {
    pub fn spawn(role: Role, command: &PlayerCommand, file: &Path) -> io::Result<Self> {
        let child = command.command_for(file).spawn()?;
        debug!(%role, pid = child.id(), cmd = %command.display_for(file), "player started");
        Ok(Self { role, child })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Non-blocking exit check; reaps the child once it has exited.
    pub fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Kill whatever is left in the process group after the leader has exited,
    /// e.g. the real player behind a `sh -c` wrapper.
    pub fn kill_orphans(&self) {
        if signal_group(self.child.id(), Signal::Kill) {
            debug!(role = %self.role, pid = self.child.id(), "killed leftover player group");
        }
    }

    /// Ask the process to exit, wait up to `grace`, then kill it.
    pub fn stop(mut self, grace: Duration) -> StopOutcome {
        let role = self.role;
        let pid = self.child.id();
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(%role, pid, ?status, "player already exited");
                return StopOutcome::AlreadyExited;
            }
            Ok(None) => {}
            Err(err) => warn!(%role, pid, "player status check failed: {err}"),
        }

        signal_group(pid, Signal::Term);
        let started = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%role, pid, ?status, "player stopped");
                    return StopOutcome::Terminated;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(%role, pid, "player status check failed while stopping: {err}");
                    break;
                }
            }
            if started.elapsed() >= grace {
                break;
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }

        warn!(%role, pid, grace_ms = grace.as_millis() as u64, "player ignored SIGTERM; killing");
        if !signal_group(pid, Signal::Kill) {
            if let Err(err) = self.child.kill() {
                warn!(%role, pid, "SIGKILL failed: {err}");
            }
        }
        if let Err(err) = self.child.wait() {
            warn!(%role, pid, "waiting for killed player failed: {err}");
        }
        StopOutcome::Killed
    }
}

enum Signal {
    Term,
    Kill,
}

/// Signal the player's whole process group (players run as group leaders, so
/// wrapper shells take their children down with them). Returns false when the
/// signal could not be sent.
#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) -> bool {
    let signo = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill only sends a signal; the group is led by a child we have not reaped yet.
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), signo) };
    if ret != 0 {
        debug!(pid, signo, "signal to player group failed: {}", io::Error::last_os_error());
        return false;
    }
    true
}

#[cfg(not(unix))]
fn signal_group(pid: u32, signal: Signal) -> bool {
    if let Signal::Term = signal {
        debug!(pid, "graceful stop unsupported on this platform; waiting for grace period");
    }
    false
}
