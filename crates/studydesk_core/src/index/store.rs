//! Data file load/save and the owning `IndexStore`.
//!
//! # Responsibility
//! - Read the data file once, migrate it, and hand out the aggregate.
//! - Persist every mutation with temp-file + fsync + rename.
//!
//! # Invariants
//! - An absent data file yields the empty default index and is not created
//!   until the first mutation.
//! - `mutate` either persists the new aggregate or restores the old one.

use super::migrations::{apply_migrations, latest_version};
use super::{IndexError, IndexResult, RecoveryPolicy};
use crate::model::index::Index;
use chrono::Utc;
use log::{error, info, warn};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Owner of the in-memory aggregate and its data file.
#[derive(Debug)]
pub struct IndexStore {
    path: Option<PathBuf>,
    index: Index,
}

impl IndexStore {
    /// Opens the data file at `path`, applying `policy` to unreadable content.
    ///
    /// # Side effects
    /// - Rewrites the file when an older document version was upgraded.
    /// - Renames a corrupt file aside under `RecoveryPolicy::Quarantine`.
    /// - Emits `index_open` events with duration and status.
    pub fn open(path: impl AsRef<Path>, policy: RecoveryPolicy) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        let started_at = Instant::now();
        info!("event=index_open module=index status=start");

        let index = match load_index(&path) {
            Ok(Some((index, previous_version))) => {
                if previous_version < latest_version() {
                    save_index(&path, &index)?;
                    info!(
                        "event=index_migrate module=index status=ok from_version={} to_version={}",
                        previous_version,
                        latest_version()
                    );
                }
                index
            }
            Ok(None) => Index::default(),
            Err(err @ IndexError::Corrupt { .. }) if policy == RecoveryPolicy::Quarantine => {
                let moved_to = quarantine(&path)?;
                warn!(
                    "event=index_quarantine module=index status=ok moved_to={} reason={}",
                    moved_to.display(),
                    err.code()
                );
                Index::default()
            }
            Err(err) => {
                error!(
                    "event=index_open module=index status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=index_open module=index status=ok duration_ms={} subjects={} calendar_notes={}",
            started_at.elapsed().as_millis(),
            index.subjects.len(),
            index.calendar_notes.len()
        );
        Ok(Self {
            path: Some(path),
            index,
        })
    }

    /// Store without a backing file; saves are no-ops.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            index: Index::default(),
        }
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the full aggregate to the data file.
    pub fn save(&self) -> IndexResult<()> {
        match self.path.as_deref() {
            Some(path) => save_index(path, &self.index),
            None => Ok(()),
        }
    }

    /// Applies `change` and persists the result.
    ///
    /// On save failure the aggregate is rolled back and the error returned.
    pub fn mutate<T>(&mut self, change: impl FnOnce(&mut Index) -> T) -> IndexResult<T> {
        let previous = self.index.clone();
        let output = change(&mut self.index);
        if let Err(err) = self.save() {
            self.index = previous;
            return Err(err);
        }
        Ok(output)
    }
}

/// Reads and migrates the data file.
///
/// Returns `None` when the file does not exist, otherwise the aggregate and
/// the document version found on disk.
pub fn load_index(path: &Path) -> IndexResult<Option<(Index, u32)>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(IndexError::io(path, err)),
    };

    let corrupt = |message: String| IndexError::Corrupt {
        path: path.to_path_buf(),
        message,
    };

    let mut document: Value = serde_json::from_str(&raw).map_err(|err| corrupt(err.to_string()))?;
    let previous_version = apply_migrations(path, &mut document)?;
    let index: Index =
        serde_json::from_value(document).map_err(|err| corrupt(err.to_string()))?;

    Ok(Some((index, previous_version)))
}

/// Serializes `index` and atomically replaces the file at `path`.
pub fn save_index(path: &Path, index: &Index) -> IndexResult<()> {
    let started_at = Instant::now();
    let bytes = serde_json::to_vec_pretty(index).map_err(IndexError::Serialize)?;

    if let Err(err) = write_atomic(path, &bytes) {
        error!(
            "event=index_save module=index status=error duration_ms={} error_code=index_io error={}",
            started_at.elapsed().as_millis(),
            err
        );
        return Err(IndexError::io(path, err));
    }

    info!(
        "event=index_save module=index status=ok duration_ms={} bytes={}",
        started_at.elapsed().as_millis(),
        bytes.len()
    );
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    let tmp = parent.join(format!(".{file_name}.tmp-{}", std::process::id()));

    let written = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
        return written;
    }

    sync_dir(&parent);
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn quarantine(path: &Path) -> IndexResult<PathBuf> {
    let mut target = path.as_os_str().to_os_string();
    target.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%SZ")));
    let target = PathBuf::from(target);
    fs::rename(path, &target).map_err(|err| IndexError::io(path, err))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::{load_index, save_index, IndexStore};
    use crate::model::index::Index;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let loaded = load_index(&dir.path().join("absent.json")).expect("load should succeed");
        assert!(loaded.is_none());
    }

    #[test]
    fn save_replaces_file_without_leaving_temp_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("study_data.json");
        let mut index = Index::default();
        index.api_key = Some("key".to_string());

        save_index(&path, &index).expect("first save");
        index.api_key = None;
        save_index(&path, &index).expect("second save");

        let (loaded, _) = load_index(&path).expect("load").expect("file exists");
        assert_eq!(loaded, index);
        let names = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect::<Vec<_>>();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn in_memory_store_mutates_without_a_file() {
        let mut store = IndexStore::in_memory();
        store
            .mutate(|index| index.api_key = Some("k".to_string()))
            .expect("mutate should succeed");
        assert_eq!(store.index().api_key.as_deref(), Some("k"));
        assert!(store.path().is_none());
    }
}
