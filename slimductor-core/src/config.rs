//! Optional `~/.claude/slimductor.yaml`.
//!
//! ```yaml
//! registry_dir: active        # relative to ~/.claude, or absolute
//! max_age_hours: 4            # reap entries older than this even if the pid answers
//! ```
//!
//! Every key is optional and a missing file means defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, RegistryError};
use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_hours: Option<u32>,
}

impl Config {
    /// Entry directory, resolved against `<home>/.claude` when relative.
    pub fn registry_dir(&self, home: &Path) -> PathBuf {
        match &self.registry_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => paths::claude_root(home).join(dir),
            None => paths::registry_dir(home),
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_hours.map(|h| Duration::hours(i64::from(h)))
    }
}

/// Load `<home>/.claude/slimductor.yaml`, or defaults if it does not exist.
pub fn load_at(home: &Path) -> Result<Config, RegistryError> {
    let path = paths::config_path(home);
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(io_err(path, e)),
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| RegistryError::Config { path, source })
}

pub fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}
