//! Who is calling: session id, tracking pid and project domain.
//!
//! Hooks run as short-lived children of the host application, so the pid
//! recorded for liveness is the parent's, not the hook's own. On Windows the
//! hook is usually started through launcher and shell wrappers, so the
//! process tree is walked past them to the host.

use std::path::{Path, PathBuf};

use crate::error::{io_err, RegistryError};
use crate::types::SessionId;

/// Host-assigned session id.
pub const SESSION_ID_ENV: &str = "CLAUDE_SESSION_ID";
/// Shared task list the host groups sessions under. Informational only.
pub const TASK_LIST_ENV: &str = "CLAUDE_CODE_TASK_LIST_ID";

/// Host executable names, matched case-insensitively.
const HOST_NAMES: &[&str] = &["claude.exe", "claude"];
/// Short-lived wrappers that sit between the host and a hook.
const WRAPPER_NAMES: &[&str] = &[
    "py.exe",
    "python.exe",
    "python3",
    "python",
    "bash.exe",
    "bash",
    "sh.exe",
    "sh",
];
const MAX_ANCESTORS: usize = 15;

/// A live process as seen in a process-table snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub parent: Option<u32>,
    pub name: String,
}

/// Long-lived process to record for liveness: the parent when it is a real
/// process (> 1), otherwise this process.
#[cfg(not(windows))]
pub fn tracking_pid() -> u32 {
    tracking_pid_from(parent_pid(), std::process::id())
}

/// Long-lived process to record for liveness: the host ancestor, found by
/// walking past wrapper processes.
#[cfg(windows)]
pub fn tracking_pid() -> u32 {
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::All, ProcessRefreshKind::new());
    host_pid_from(std::process::id(), |pid| {
        system.process(Pid::from_u32(pid)).map(|p| ProcessInfo {
            parent: p.parent().map(|pp| pp.as_u32()),
            name: p.name().to_string_lossy().into_owned(),
        })
    })
}

/// Walk up from `own`: the first host ancestor wins; otherwise the first
/// live ancestor that is not a wrapper; otherwise the last live ancestor
/// seen. `lookup` answers `None` for processes that no longer exist.
pub fn host_pid_from(own: u32, lookup: impl Fn(u32) -> Option<ProcessInfo>) -> u32 {
    let mut pid = own;
    let mut last_alive = own;
    for _ in 0..MAX_ANCESTORS {
        let parent = match lookup(pid).and_then(|p| p.parent) {
            Some(ppid) if ppid > 1 && ppid != pid => ppid,
            _ => break,
        };
        if let Some(info) = lookup(parent) {
            let name = info.name.to_ascii_lowercase();
            if HOST_NAMES.contains(&name.as_str()) {
                return parent;
            }
            last_alive = parent;
            if !WRAPPER_NAMES.contains(&name.as_str()) {
                break;
            }
        }
        pid = parent;
    }
    last_alive
}

pub fn tracking_pid_from(parent: Option<u32>, own: u32) -> u32 {
    match parent {
        Some(ppid) if ppid > 1 => ppid,
        _ => own,
    }
}

#[cfg(unix)]
fn parent_pid() -> Option<u32> {
    Some(std::os::unix::process::parent_id())
}

#[cfg(not(any(unix, windows)))]
fn parent_pid() -> Option<u32> {
    None
}

/// Explicit id, then `$CLAUDE_SESSION_ID`, then `pid-<tracking pid>`.
pub fn resolve_session_id(explicit: Option<String>, tracking_pid: u32) -> SessionId {
    let from_env = std::env::var(SESSION_ID_ENV).ok();
    session_id_from(explicit, from_env, tracking_pid)
}

pub fn session_id_from(
    explicit: Option<String>,
    from_env: Option<String>,
    tracking_pid: u32,
) -> SessionId {
    explicit
        .into_iter()
        .chain(from_env)
        .map(|s| s.trim().to_owned())
        .find(|s| !s.is_empty())
        .map(SessionId::from)
        .unwrap_or_else(|| SessionId(format!("pid-{tracking_pid}")))
}

pub fn task_list_id() -> Option<String> {
    std::env::var(TASK_LIST_ENV).ok().filter(|s| !s.is_empty())
}

/// Absolute domain key for `cwd` (default: the current directory).
///
/// Existing paths are canonicalized so that symlinked and relative spellings
/// of one directory land in the same domain.
pub fn resolve_domain(cwd: Option<&Path>) -> Result<PathBuf, RegistryError> {
    let current = std::env::current_dir().map_err(|e| io_err(".", e))?;
    let raw = match cwd {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => current.join(p),
        None => current,
    };
    Ok(raw.canonicalize().unwrap_or(raw))
}
