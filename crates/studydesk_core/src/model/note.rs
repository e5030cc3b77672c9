//! Note entry records and kind filters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name prefix carried by generated exercise sheets.
pub const EXERCISE_PREFIX: &str = "GENERATED_";

/// Prefixes that marked exercise sheets before `kind` was stored.
pub const LEGACY_EXERCISE_PREFIXES: &[&str] = &["CWICZENIA_", EXERCISE_PREFIX];

/// What a tracked file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// Material imported by the user.
    Note,
    /// Sheet produced by the exercise generator.
    Exercise,
}

impl NoteKind {
    /// Kind implied by a legacy file name, for indexes written without `kind`.
    pub fn from_legacy_name(name: &str) -> Self {
        if LEGACY_EXERCISE_PREFIXES
            .iter()
            .any(|prefix| name.contains(prefix))
        {
            Self::Exercise
        } else {
            Self::Note
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Exercise => "exercise",
        }
    }
}

/// Selection used by list and search calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KindFilter {
    #[default]
    All,
    NotesOnly,
    ExercisesOnly,
}

impl KindFilter {
    pub fn matches(self, kind: NoteKind) -> bool {
        match self {
            Self::All => true,
            Self::NotesOnly => kind == NoteKind::Note,
            Self::ExercisesOnly => kind == NoteKind::Exercise,
        }
    }

    /// Parses `all|notes|exercises` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "notes" | "note" => Some(Self::NotesOnly),
            "exercises" | "exercise" => Some(Self::ExercisesOnly),
            _ => None,
        }
    }
}

/// Persisted form of one tracked file; the note name is its map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub path: PathBuf,
    pub kind: NoteKind,
}

/// One tracked file as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEntry {
    pub subject: String,
    /// Unique within `subject`.
    pub name: String,
    pub path: PathBuf,
    pub kind: NoteKind,
}

impl NoteEntry {
    pub(crate) fn from_stored(subject: &str, name: &str, stored: &StoredEntry) -> Self {
        Self {
            subject: subject.to_string(),
            name: name.to_string(),
            path: stored.path.clone(),
            kind: stored.kind,
        }
    }
}
