//! Document migration registry and executor.
//!
//! # Responsibility
//! - Register document upgrades in strictly increasing version order.
//! - Upgrade a raw JSON document before it is deserialized.
//!
//! # Invariants
//! - `version` values are monotonic.
//! - A document without `schema_version` is version 0, the first on-disk format
//!   where entries carried only `path`.

use super::{IndexError, IndexResult};
use crate::model::note::NoteKind;
use serde_json::{Map, Value};
use std::path::Path;

const SCHEMA_VERSION_KEY: &str = "schema_version";

#[derive(Clone, Copy)]
struct Migration {
    version: u32,
    apply: fn(&mut Map<String, Value>) -> Result<(), String>,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    apply: explicit_entry_kind,
}];

/// Latest document version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Reads the document version, treating a missing field as version 0.
pub fn document_version(document: &Map<String, Value>) -> Result<u32, String> {
    match document.get(SCHEMA_VERSION_KEY) {
        None => Ok(0),
        Some(value) => value
            .as_u64()
            .and_then(|version| u32::try_from(version).ok())
            .ok_or_else(|| format!("`{SCHEMA_VERSION_KEY}` must be a non-negative integer")),
    }
}

/// Applies every pending migration to `document`.
///
/// Returns the version the document had before upgrading.
pub fn apply_migrations(path: &Path, document: &mut Value) -> IndexResult<u32> {
    let corrupt = |message: String| IndexError::Corrupt {
        path: path.to_path_buf(),
        message,
    };

    let root = document
        .as_object_mut()
        .ok_or_else(|| corrupt("top-level value must be an object".to_string()))?;
    let current = document_version(root).map_err(corrupt)?;
    let latest = latest_version();

    if current > latest {
        return Err(IndexError::UnsupportedSchemaVersion {
            found: current,
            latest_supported: latest,
        });
    }

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        (migration.apply)(root).map_err(corrupt)?;
        root.insert(
            SCHEMA_VERSION_KEY.to_string(),
            Value::from(migration.version),
        );
    }

    Ok(current)
}

/// v1: every entry records its kind instead of relying on a name prefix.
fn explicit_entry_kind(root: &mut Map<String, Value>) -> Result<(), String> {
    let subjects = root
        .entry("subjects")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| "`subjects` must be an object".to_string())?;

    for (subject, notes) in subjects.iter_mut() {
        let notes = notes
            .as_object_mut()
            .ok_or_else(|| format!("subject `{subject}` must map names to entries"))?;
        for (name, entry) in notes.iter_mut() {
            let entry = entry
                .as_object_mut()
                .ok_or_else(|| format!("entry `{subject}/{name}` must be an object"))?;
            if !entry.contains_key("kind") {
                let kind = NoteKind::from_legacy_name(name).as_str();
                entry.insert("kind".to_string(), Value::from(kind));
            }
        }
    }

    Ok(())
}
