//! Entry storage: one file per session.
//!
//! # Storage layout
//!
//! ```text
//! ~/.claude/
//!   active/
//!     <session_id>.json          (one entry, mode 0600)
//!     <session_id>.json.<pid>.tmp (in-flight write, renamed over the entry)
//! ```
//!
//! Readers may scan the directory at any moment, so entries are never written
//! in place: serialize → temp sibling → `chmod 0600` → `rename`. Deleting an
//! entry that is already gone is a success, which makes concurrent reaping of
//! the same stale file harmless.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{io_err, RegistryError};
use crate::paths::{self, ENTRY_EXT};
use crate::types::{SessionEntry, SessionId};

/// Lazy, one-shot enumeration of the entries present at scan time.
pub type Entries<'a> =
    Box<dyn Iterator<Item = Result<(SessionId, SessionEntry), RegistryError>> + 'a>;

/// Storage backend for session entries.
pub trait EntryStore {
    /// Persist `entry` under its session id, atomically replacing any previous one.
    fn write(&self, entry: &SessionEntry) -> Result<(), RegistryError>;

    /// Returns `RegistryError::EntryNotFound` if absent,
    /// `RegistryError::Malformed` if the record does not parse.
    fn read(&self, session_id: &SessionId) -> Result<SessionEntry, RegistryError>;

    /// Remove the entry; succeeds if it is already absent.
    fn delete(&self, session_id: &SessionId) -> Result<(), RegistryError>;

    /// Enumerate stored entries. Records that cannot be read or parsed are
    /// skipped; only a failure to open the directory itself is an error.
    fn list_all(&self) -> Result<Entries<'_>, RegistryError>;
}

impl<S: EntryStore + ?Sized> EntryStore for &S {
    fn write(&self, entry: &SessionEntry) -> Result<(), RegistryError> {
        (**self).write(entry)
    }

    fn read(&self, session_id: &SessionId) -> Result<SessionEntry, RegistryError> {
        (**self).read(session_id)
    }

    fn delete(&self, session_id: &SessionId) -> Result<(), RegistryError> {
        (**self).delete(session_id)
    }

    fn list_all(&self) -> Result<Entries<'_>, RegistryError> {
        (**self).list_all()
    }
}

// ---------------------------------------------------------------------------
// 1. Directory-backed store
// ---------------------------------------------------------------------------

/// Production store bound to an entry directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the default `<home>/.claude/active/`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(paths::registry_dir(home))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, session_id: &SessionId) -> PathBuf {
        paths::entry_path(&self.dir, session_id.as_str())
    }

    /// Creates the directory (mode `0700`) if it does not yet exist.
    fn ensure_dir(&self) -> Result<(), RegistryError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
            set_dir_permissions(&self.dir)?;
        }
        Ok(())
    }
}

impl EntryStore for DirStore {
    fn write(&self, entry: &SessionEntry) -> Result<(), RegistryError> {
        entry.session_id.validate()?;
        self.ensure_dir()?;

        let path = self.entry_path(&entry.session_id);
        let tmp_path = paths::entry_tmp_path(&self.dir, entry.session_id.as_str());
        let json = serde_json::to_string_pretty(entry)?;

        fs::write(&tmp_path, json).map_err(|e| io_err(&tmp_path, e))?;
        set_file_permissions(&tmp_path)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err(&path, e));
        }
        tracing::debug!(session = %entry.session_id, path = %path.display(), "wrote entry");
        Ok(())
    }

    fn read(&self, session_id: &SessionId) -> Result<SessionEntry, RegistryError> {
        session_id.validate()?;
        let path = self.entry_path(session_id);
        match read_entry(&path)? {
            Some(entry) => Ok(entry),
            None => Err(RegistryError::EntryNotFound {
                session_id: session_id.0.clone(),
            }),
        }
    }

    fn delete(&self, session_id: &SessionId) -> Result<(), RegistryError> {
        session_id.validate()?;
        let path = self.entry_path(session_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(session = %session_id, "deleted entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(path, e)),
        }
    }

    fn list_all(&self) -> Result<Entries<'_>, RegistryError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Box::new(std::iter::empty())),
            Err(e) => return Err(io_err(&self.dir, e)),
        };

        let dir = self.dir.as_path();
        let iter = read_dir.filter_map(move |dirent| {
            let dirent = match dirent {
                Ok(d) => d,
                Err(e) => return Some(Err(io_err(dir, e))),
            };
            let path = dirent.path();
            if path.extension().and_then(|x| x.to_str()) != Some(ENTRY_EXT) {
                return None;
            }
            // `*.json` directories, sockets and the like are not entries
            if !dirent.file_type().map(|t| t.is_file()).unwrap_or(false) {
                tracing::debug!(path = %path.display(), "skipping non-file in registry dir");
                return None;
            }
            let stem = path.file_stem()?.to_str()?.to_owned();

            // One bad file must not hide the rest of the registry.
            match read_entry(&path) {
                Ok(Some(entry)) => Some(Ok((SessionId(stem), entry))),
                // deleted between the directory scan and the read
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable session entry"
                    );
                    None
                }
            }
        });
        Ok(Box::new(iter))
    }
}

/// `Ok(None)` when the file does not exist.
fn read_entry(path: &Path) -> Result<Option<SessionEntry>, RegistryError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| RegistryError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

// ---------------------------------------------------------------------------
// 2. In-memory store
// ---------------------------------------------------------------------------

/// Map-backed store for tests and embedding callers that do not need
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<SessionId, SessionEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.lock().contains_key(session_id)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SessionId, SessionEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EntryStore for MemoryStore {
    fn write(&self, entry: &SessionEntry) -> Result<(), RegistryError> {
        entry.session_id.validate()?;
        self.lock().insert(entry.session_id.clone(), entry.clone());
        Ok(())
    }

    fn read(&self, session_id: &SessionId) -> Result<SessionEntry, RegistryError> {
        self.lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| RegistryError::EntryNotFound {
                session_id: session_id.0.clone(),
            })
    }

    fn delete(&self, session_id: &SessionId) -> Result<(), RegistryError> {
        self.lock().remove(session_id);
        Ok(())
    }

    fn list_all(&self) -> Result<Entries<'_>, RegistryError> {
        let snapshot: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, entry)| Ok((id.clone(), entry.clone())))
            .collect();
        Ok(Box::new(snapshot.into_iter()))
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
