use std::path::{Path, PathBuf};

pub const ACTIVE_DIR: &str = "active";
pub const CONFIG_FILE: &str = "slimductor.yaml";
pub const ENTRY_EXT: &str = "json";

pub fn claude_root(home: &Path) -> PathBuf {
    home.join(".claude")
}

/// Default entry directory: `<home>/.claude/active/`.
pub fn registry_dir(home: &Path) -> PathBuf {
    claude_root(home).join(ACTIVE_DIR)
}

pub fn config_path(home: &Path) -> PathBuf {
    claude_root(home).join(CONFIG_FILE)
}

/// `<dir>/<session_id>.json`, pure, no I/O.
pub fn entry_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{session_id}.{ENTRY_EXT}"))
}

/// Sibling temp file for an atomic write, unique per writing process.
pub fn entry_tmp_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!(
        "{session_id}.{ENTRY_EXT}.{}.tmp",
        std::process::id()
    ))
}
