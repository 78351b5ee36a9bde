//! Process liveness.
//!
//! An entry is stale only when its process is provably gone. On Unix the probe
//! is `kill(pid, 0)`: it performs the existence and permission checks without
//! delivering a signal. `EPERM` means the process exists but belongs to
//! another user, so it counts as alive. On Windows the probe is a `sysinfo`
//! process-table lookup. Other platforms have no probe and answer alive for
//! every pid.
//!
//! A reused PID is indistinguishable from the original owner; an entry whose
//! pid was recycled stays registered until that unrelated process exits (or
//! until the optional max-age limit in [`crate::config::Config`] expires it).

/// Answers "is this process still running?".
pub trait LivenessOracle {
    fn is_alive(&self, pid: u32) -> bool;
}

impl<F> LivenessOracle for F
where
    F: Fn(u32) -> bool,
{
    fn is_alive(&self, pid: u32) -> bool {
        self(pid)
    }
}

/// Oracle backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLiveness;

impl LivenessOracle for OsLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }
}

/// Check whether an OS process with the given PID exists.
pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        pid_alive_unix(pid)
    }

    #[cfg(windows)]
    {
        pid_alive_windows(pid)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        true
    }
}

#[cfg(windows)]
fn pid_alive_windows(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

    // System Idle Process, never a session
    if pid == 0 {
        return false;
    }
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), ProcessRefreshKind::new());
    system.process(pid).is_some()
}

#[cfg(unix)]
fn pid_alive_unix(pid: u32) -> bool {
    // 0 and negative values address process groups, not a single process.
    let pid = match libc::pid_t::try_from(pid) {
        Ok(p) if p > 0 => p,
        _ => return false,
    };
    // SAFETY: kill with sig=0 never sends a signal; it only checks PID existence.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    matches!(
        std::io::Error::last_os_error().raw_os_error(),
        Some(code) if code == libc::EPERM
    )
}
