//! Persistence of the study aggregate as one JSON document.
//!
//! # Responsibility
//! - Load the data file, upgrading older document versions in place.
//! - Rewrite the whole document atomically after every mutation.
//!
//! # Invariants
//! - Document version is tracked by the top-level `schema_version` field.
//! - Callers never see an `Index` before migrations have succeeded.
//! - A failed save leaves both the file and the in-memory aggregate unchanged.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod store;

pub use store::{load_index, save_index, IndexStore};

pub type IndexResult<T> = Result<T, IndexError>;

/// What to do when the data file exists but cannot be understood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Surface `IndexError::Corrupt` to the caller.
    #[default]
    Fail,
    /// Move the unreadable file aside and continue with an empty index.
    Quarantine,
}

impl RecoveryPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Some(Self::Fail),
            "quarantine" => Some(Self::Quarantine),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum IndexError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Corrupt {
        path: PathBuf,
        message: String,
    },
    UnsupportedSchemaVersion {
        found: u32,
        latest_supported: u32,
    },
    Serialize(serde_json::Error),
}

impl Display for IndexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "index file I/O failed at `{}`: {source}", path.display())
            }
            Self::Corrupt { path, message } => {
                write!(f, "index file `{}` is corrupt: {message}", path.display())
            }
            Self::UnsupportedSchemaVersion {
                found,
                latest_supported,
            } => write!(
                f,
                "index schema version {found} is newer than supported {latest_supported}"
            ),
            Self::Serialize(err) => write!(f, "index serialization failed: {err}"),
        }
    }
}

impl Error for IndexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::Corrupt { .. } | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable code used in log lines and FFI messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "index_io",
            Self::Corrupt { .. } => "index_corrupt",
            Self::UnsupportedSchemaVersion { .. } => "index_unsupported_version",
            Self::Serialize(_) => "index_serialize",
        }
    }
}
