//! Library use-case service: subjects, imported notes and generated sheets.
//!
//! # Responsibility
//! - Keep `Index.subjects` and the managed notes directory in lock-step.
//! - Provide import/delete and generated-sheet registration (`LibraryService`)
//!   and resolve/list/search reads (`LibraryReader`).
//!
//! # Invariants
//! - File work happens first; the index is updated only after it succeeded.
//! - A failed index save after a fresh write removes the written file again.
//! - Two entries never share one managed path; a collision replaces the older
//!   entry (at most one named copy).
//! - Listing order is subject then note name.

use crate::index::{IndexError, IndexStore};
use crate::model::index::DashboardCounts;
use crate::model::note::{KindFilter, NoteEntry, NoteKind, StoredEntry};
use crate::repo::note_files::{derived_file_name, sanitize_file_name, NoteFiles};
use crate::text::note_plain_text;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Service error for library use-cases.
#[derive(Debug)]
pub enum LibraryError {
    /// Subject label is blank.
    InvalidSubject(String),
    /// Note name cannot become a managed file name.
    InvalidName(String),
    /// Import source does not exist or is not a regular file.
    SourceNotFound(PathBuf),
    /// No entry with this subject and name.
    NotFound { subject: String, name: String },
    /// Managed file operation failed; the index was left untouched.
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    /// Index persistence failed; the in-memory index was rolled back.
    Index(IndexError),
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSubject(value) => write!(f, "invalid subject: `{value}`"),
            Self::InvalidName(value) => write!(f, "invalid note name: `{value}`"),
            Self::SourceNotFound(path) => write!(f, "source file not found: {}", path.display()),
            Self::NotFound { subject, name } => write!(f, "note not found: {subject}/{name}"),
            Self::Io { op, path, source } => {
                write!(f, "{op} failed for `{}`: {source}", path.display())
            }
            Self::Index(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Index(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IndexError> for LibraryError {
    fn from(value: IndexError) -> Self {
        Self::Index(value)
    }
}

impl LibraryError {
    /// Stable code used in log lines and FFI messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSubject(_) => "invalid_subject",
            Self::InvalidName(_) => "invalid_name",
            Self::SourceNotFound(_) => "source_not_found",
            Self::NotFound { .. } => "not_found",
            Self::Io { .. } => "io",
            Self::Index(err) => err.code(),
        }
    }
}

/// Library service over a borrowed index store and managed directory.
pub struct LibraryService<'a, F: NoteFiles> {
    store: &'a mut IndexStore,
    files: &'a F,
}

impl<'a, F: NoteFiles> LibraryService<'a, F> {
    pub fn new(store: &'a mut IndexStore, files: &'a F) -> Self {
        Self { store, files }
    }

    /// Copies `source` into the managed directory and records it under `subject`.
    ///
    /// # Contract
    /// - Creates `subject` when it is new.
    /// - The entry name is the source file name; the managed file is
    ///   `{subject}_{file name}`.
    /// - Re-importing the same name overwrites the prior file and entry.
    pub fn import(&mut self, source: &Path, subject: &str) -> LibraryResult<NoteEntry> {
        let subject = normalize_subject(subject)?;
        if !source.is_file() {
            return Err(LibraryError::SourceNotFound(source.to_path_buf()));
        }
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| LibraryError::InvalidName(source.display().to_string()))?;

        let file_name = derived_file_name(&subject, &name);
        let existed = self.files.exists(&self.files.root().join(&file_name));
        let path = self.files.copy_in(source, &file_name).map_err(|err| {
            if source.exists() {
                LibraryError::Io {
                    op: "copy",
                    path: source.to_path_buf(),
                    source: err,
                }
            } else {
                LibraryError::SourceNotFound(source.to_path_buf())
            }
        })?;

        let entry = self.record(&subject, &name, path, NoteKind::Note, existed)?;
        info!(
            "event=note_import module=library status=ok kind={} overwrite={}",
            entry.kind.as_str(),
            existed
        );
        Ok(entry)
    }

    /// Writes a generated sheet and records it as an exercise under `subject`.
    pub fn register_generated(
        &mut self,
        subject: &str,
        name: &str,
        html: &str,
    ) -> LibraryResult<NoteEntry> {
        let subject = normalize_subject(subject)?;
        let file_name = sanitize_file_name(name);
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(LibraryError::InvalidName(name.to_string()));
        }

        let existed = self.files.exists(&self.files.root().join(&file_name));
        let path = self
            .files
            .write(&file_name, html.as_bytes())
            .map_err(|err| LibraryError::Io {
                op: "write",
                path: self.files.root().join(&file_name),
                source: err,
            })?;

        let entry = self.record(&subject, name, path, NoteKind::Exercise, existed)?;
        info!(
            "event=note_register module=library status=ok kind={} overwrite={} bytes={}",
            entry.kind.as_str(),
            existed,
            html.len()
        );
        Ok(entry)
    }

    /// Removes the file and the entry together.
    ///
    /// Returns `Ok(false)` when no such entry exists. A file already missing
    /// from disk is tolerated.
    pub fn delete(&mut self, subject: &str, name: &str) -> LibraryResult<bool> {
        let subject = subject.trim();
        let Some(entry) = self.reader().entry(subject, name).ok() else {
            info!("event=note_delete module=library status=noop reason=not_tracked");
            return Ok(false);
        };

        // File first: if the save below fails, the stale entry can be
        // deleted again since a missing file is tolerated.
        let file_removed = self
            .files
            .remove(&entry.path)
            .map_err(|err| LibraryError::Io {
                op: "remove",
                path: entry.path.clone(),
                source: err,
            })?;

        self.store.mutate(|index| {
            if let Some(notes) = index.subjects.get_mut(subject) {
                notes.remove(name);
            }
        })?;

        info!(
            "event=note_delete module=library status=ok kind={} file_removed={}",
            entry.kind.as_str(),
            file_removed
        );
        Ok(true)
    }

    /// Creates an empty subject. Returns `false` when it already existed.
    pub fn ensure_subject(&mut self, subject: &str) -> LibraryResult<bool> {
        let subject = normalize_subject(subject)?;
        if self.store.index().subjects.contains_key(&subject) {
            return Ok(false);
        }
        self.store.mutate(|index| {
            index.subjects.entry(subject).or_default();
        })?;
        Ok(true)
    }

    /// Read-only view over the same store and directory.
    pub fn reader(&self) -> LibraryReader<'_, F> {
        LibraryReader::new(&*self.store, self.files)
    }

    fn record(
        &mut self,
        subject: &str,
        name: &str,
        path: PathBuf,
        kind: NoteKind,
        file_existed: bool,
    ) -> LibraryResult<NoteEntry> {
        let displaced = self
            .store
            .index()
            .entries()
            .filter(|entry| entry.path == path && (entry.subject != subject || entry.name != name))
            .count();
        if file_existed || displaced > 0 {
            warn!(
                "event=note_record module=library status=ok collision=overwrite displaced_entries={}",
                displaced
            );
        }

        let stored = StoredEntry {
            path: path.clone(),
            kind,
        };
        let saved = self.store.mutate(|index| {
            for notes in index.subjects.values_mut() {
                notes.retain(|_, existing| existing.path != stored.path);
            }
            index
                .subjects
                .entry(subject.to_string())
                .or_default()
                .insert(name.to_string(), stored.clone());
        });

        if let Err(err) = saved {
            if !file_existed {
                if let Err(cleanup) = self.files.remove(&path) {
                    warn!(
                        "event=note_record module=library status=error cleanup=failed path={} error={}",
                        path.display(),
                        cleanup
                    );
                }
            }
            return Err(err.into());
        }

        Ok(NoteEntry {
            subject: subject.to_string(),
            name: name.to_string(),
            path,
            kind,
        })
    }
}

/// Read-only library queries.
pub struct LibraryReader<'a, F: NoteFiles> {
    store: &'a IndexStore,
    files: &'a F,
}

impl<'a, F: NoteFiles> LibraryReader<'a, F> {
    pub fn new(store: &'a IndexStore, files: &'a F) -> Self {
        Self { store, files }
    }

    pub fn entry(&self, subject: &str, name: &str) -> LibraryResult<NoteEntry> {
        let subject = subject.trim();
        self.store
            .index()
            .entry(subject, name)
            .ok_or_else(|| LibraryError::NotFound {
                subject: subject.to_string(),
                name: name.to_string(),
            })
    }

    /// Managed file path for one entry.
    pub fn resolve(&self, subject: &str, name: &str) -> LibraryResult<PathBuf> {
        self.entry(subject, name).map(|entry| entry.path)
    }

    /// Entries of one subject matching `filter`, sorted by name.
    ///
    /// An unknown subject yields an empty list.
    pub fn list_by_subject(&self, subject: &str, filter: KindFilter) -> Vec<NoteEntry> {
        let subject = subject.trim();
        self.store
            .index()
            .subjects
            .get(subject)
            .map(|notes| {
                notes
                    .iter()
                    .filter(|(_, stored)| filter.matches(stored.kind))
                    .map(|(name, stored)| NoteEntry::from_stored(subject, name, stored))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entries of every subject matching `filter`.
    pub fn list_all(&self, filter: KindFilter) -> Vec<NoteEntry> {
        self.store
            .index()
            .entries()
            .filter(|entry| filter.matches(entry.kind))
            .collect()
    }

    /// All subject labels, including empty subjects.
    pub fn subjects(&self) -> Vec<String> {
        self.store.index().subjects.keys().cloned().collect()
    }

    /// Case-insensitive substring match on note name or subject.
    pub fn search(&self, query: &str, filter: KindFilter) -> Vec<NoteEntry> {
        let needle = query.trim().to_lowercase();
        self.list_all(filter)
            .into_iter()
            .filter(|entry| {
                needle.is_empty()
                    || entry.name.to_lowercase().contains(&needle)
                    || entry.subject.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Readable text of one note, markup removed.
    pub fn read_note_text(&self, subject: &str, name: &str) -> LibraryResult<String> {
        let entry = self.entry(subject, name)?;
        self.read_entry_text(&entry)
    }

    pub(crate) fn read_entry_text(&self, entry: &NoteEntry) -> LibraryResult<String> {
        let raw = self.files.read_text(&entry.path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                LibraryError::SourceNotFound(entry.path.clone())
            } else {
                LibraryError::Io {
                    op: "read",
                    path: entry.path.clone(),
                    source: err,
                }
            }
        })?;
        Ok(note_plain_text(&entry.name, &raw))
    }

    /// Tracked entries whose managed file is no longer on disk.
    pub fn missing_files(&self) -> Vec<NoteEntry> {
        self.store
            .index()
            .entries()
            .filter(|entry| !self.files.exists(&entry.path))
            .collect()
    }

    pub fn dashboard_counts(&self) -> DashboardCounts {
        self.store.index().counts()
    }
}

fn normalize_subject(subject: &str) -> LibraryResult<String> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::InvalidSubject(subject.to_string()));
    }
    Ok(trimmed.to_string())
}
