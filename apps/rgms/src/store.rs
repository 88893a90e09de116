//! # Store
//!
//! Backend selection for tracker state. The `file` backend keeps one
//! snapshot file; the `redb` backend delegates to [`RedbStore`].
//!
//! Both backends refuse to save over state that moved on since it was
//! loaded: [`Store::save`] takes the revision the caller loaded at and
//! fails with `Conflict` if the stored revision differs. The file backend
//! runs that check and the write under an exclusive lock on `<db>.lock`,
//! so two processes cannot both pass the check.

use crate::config::Backend;
use fs2::FileExt;
use rgms_core::{RedbStore, Result, RgmsError, Tracker, decode_snapshot, load_tracker, save_tracker};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

fn io_err(path: &Path, err: std::io::Error) -> RgmsError {
    RgmsError::Persistence(format!("{}: {err}", path.display()))
}

/// Opened tracker storage.
#[derive(Debug)]
pub enum Store {
    File(PathBuf),
    Redb(RedbStore),
}

impl Store {
    /// Open storage at `path`, creating an empty database if none exists.
    pub fn open(path: &Path, backend: Backend) -> Result<Self> {
        match backend {
            Backend::File => Ok(Self::File(path.to_path_buf())),
            Backend::Redb if path.exists() => Ok(Self::Redb(RedbStore::open(path)?)),
            Backend::Redb => Ok(Self::Redb(RedbStore::create(path, &Tracker::new())?)),
        }
    }

    /// Create storage at `path` holding `tracker`. Any existing file is
    /// replaced.
    pub fn create(path: &Path, backend: Backend, tracker: &Tracker) -> Result<Self> {
        let _lock = WriteLock::acquire(path)?;
        if path.exists() {
            fs::remove_file(path).map_err(|e| io_err(path, e))?;
        }
        match backend {
            Backend::File => {
                write_atomic(path, &save_tracker(tracker)?)?;
                Ok(Self::File(path.to_path_buf()))
            }
            Backend::Redb => Ok(Self::Redb(RedbStore::create(path, tracker)?)),
        }
    }

    /// Load the stored tracker; a missing snapshot file yields an empty one.
    pub fn load(&self) -> Result<Tracker> {
        match self {
            Self::File(path) if !path.exists() => Ok(Tracker::new()),
            Self::File(path) => load_tracker(&fs::read(path).map_err(|e| io_err(path, e))?),
            Self::Redb(store) => store.load(),
        }
    }

    /// Revision currently stored.
    pub fn revision(&self) -> Result<u64> {
        match self {
            Self::File(path) if !path.exists() => Ok(0),
            Self::File(path) => {
                let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
                Ok(decode_snapshot(&bytes)?.revision)
            }
            Self::Redb(store) => store.revision(),
        }
    }

    /// Persist `tracker` if the stored state is still at `base_revision`.
    pub fn save(&self, tracker: &Tracker, base_revision: u64) -> Result<()> {
        match self {
            Self::File(path) => {
                let _lock = WriteLock::acquire(path)?;
                let stored = self.revision()?;
                if stored != base_revision {
                    return Err(RgmsError::Conflict(format!(
                        "{} moved to revision {stored} since it was loaded at {base_revision}",
                        path.display()
                    )));
                }
                write_atomic(path, &save_tracker(tracker)?)?;
                debug!(path = %path.display(), revision = tracker.revision(), "snapshot written");
                Ok(())
            }
            Self::Redb(store) => store.commit(tracker, base_revision),
        }
    }
}

/// Exclusive advisory lock on `<db>.lock`, released when dropped.
#[derive(Debug)]
pub struct WriteLock {
    _file: File,
}

impl WriteLock {
    /// Block until no other writer holds the lock for `db_path`.
    pub fn acquire(db_path: &Path) -> Result<Self> {
        let mut name = OsString::from(db_path.as_os_str());
        name.push(".lock");
        let lock_path = PathBuf::from(name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_err(&lock_path, e))?;
        file.lock_exclusive().map_err(|e| io_err(&lock_path, e))?;
        Ok(Self { _file: file })
    }
}

/// Write through a uniquely named sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_err(dir, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}
