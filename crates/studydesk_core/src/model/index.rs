//! The persisted study aggregate.
//!
//! # Responsibility
//! - Hold subjects, their tracked files, calendar notes and the API key.
//!
//! # Invariants
//! - `schema_version` equals `index::migrations::latest_version()` once loaded.
//! - Subjects are never removed implicitly; an empty subject stays listed.

use crate::model::note::{NoteEntry, NoteKind, StoredEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type SubjectNotes = BTreeMap<String, StoredEntry>;

/// Whole-state snapshot written to the data file on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub schema_version: u32,
    #[serde(default)]
    pub subjects: BTreeMap<String, SubjectNotes>,
    /// `YYYY-MM-DD` -> note text.
    #[serde(default)]
    pub calendar_notes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            schema_version: crate::index::migrations::latest_version(),
            subjects: BTreeMap::new(),
            calendar_notes: BTreeMap::new(),
            api_key: None,
        }
    }
}

/// Figures shown on the dashboard cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardCounts {
    pub subjects: usize,
    pub notes: usize,
    pub exercises: usize,
}

impl Index {
    pub fn entry(&self, subject: &str, name: &str) -> Option<NoteEntry> {
        self.subjects
            .get(subject)
            .and_then(|notes| notes.get(name))
            .map(|stored| NoteEntry::from_stored(subject, name, stored))
    }

    /// Every tracked entry, ordered by subject then name.
    pub fn entries(&self) -> impl Iterator<Item = NoteEntry> + '_ {
        self.subjects.iter().flat_map(|(subject, notes)| {
            notes
                .iter()
                .map(move |(name, stored)| NoteEntry::from_stored(subject, name, stored))
        })
    }

    pub fn counts(&self) -> DashboardCounts {
        let mut counts = DashboardCounts {
            subjects: self.subjects.len(),
            ..DashboardCounts::default()
        };
        for notes in self.subjects.values() {
            for stored in notes.values() {
                match stored.kind {
                    NoteKind::Note => counts.notes += 1,
                    NoteKind::Exercise => counts.exercises += 1,
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::Index;
    use crate::model::note::{NoteKind, StoredEntry};
    use std::collections::BTreeMap;

    #[test]
    fn counts_include_empty_subjects_and_split_by_kind() {
        let mut index = Index::default();
        index.subjects.insert("Empty".to_string(), BTreeMap::new());
        let math = index.subjects.entry("Math".to_string()).or_default();
        math.insert(
            "lecture1.txt".to_string(),
            StoredEntry {
                path: "notes/Math_lecture1.txt".into(),
                kind: NoteKind::Note,
            },
        );
        math.insert(
            "GENERATED_lecture1.html".to_string(),
            StoredEntry {
                path: "notes/GENERATED_lecture1.html".into(),
                kind: NoteKind::Exercise,
            },
        );

        let counts = index.counts();
        assert_eq!(counts.subjects, 2);
        assert_eq!(counts.notes, 1);
        assert_eq!(counts.exercises, 1);
        assert_eq!(index.entries().count(), 2);
    }
}
