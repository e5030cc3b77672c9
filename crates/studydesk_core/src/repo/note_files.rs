//! Managed notes directory contract and filesystem implementation.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Characters replaced when turning subject and file names into one flat name.
const UNSAFE_FILE_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Operations on the flat managed notes directory.
pub trait NoteFiles {
    /// Directory every managed file lives in.
    fn root(&self) -> &Path;
    /// Copies `source` into the directory as `file_name`, replacing any
    /// existing file of that name.
    fn copy_in(&self, source: &Path, file_name: &str) -> io::Result<PathBuf>;
    /// Writes `contents` into the directory as `file_name`.
    fn write(&self, file_name: &str, contents: &[u8]) -> io::Result<PathBuf>;
    /// Removes `path`. Returns `false` when it was already gone.
    fn remove(&self, path: &Path) -> io::Result<bool>;
    fn read_text(&self, path: &Path) -> io::Result<String>;
    fn exists(&self, path: &Path) -> bool;
}

/// `NoteFiles` over a real directory, created on first write.
#[derive(Debug, Clone)]
pub struct FsNoteFiles {
    root: PathBuf,
}

impl FsNoteFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target(&self, file_name: &str) -> io::Result<PathBuf> {
        let safe = sanitize_file_name(file_name);
        if safe.is_empty() || safe == "." || safe == ".." {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("unusable file name `{file_name}`"),
            ));
        }
        fs::create_dir_all(&self.root)?;
        Ok(self.root.join(safe))
    }
}

impl NoteFiles for FsNoteFiles {
    fn root(&self) -> &Path {
        &self.root
    }

    fn copy_in(&self, source: &Path, file_name: &str) -> io::Result<PathBuf> {
        let target = self.target(file_name)?;
        fs::copy(source, &target)?;
        Ok(target)
    }

    fn write(&self, file_name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        let target = self.target(file_name)?;
        fs::write(&target, contents)?;
        Ok(target)
    }

    fn remove(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Flat managed file name for `file_name` imported under `subject`.
pub fn derived_file_name(subject: &str, file_name: &str) -> String {
    sanitize_file_name(&format!("{subject}_{file_name}"))
}

/// Replaces path separators and characters most filesystems reject.
pub fn sanitize_file_name(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| {
            if UNSAFE_FILE_NAME_CHARS.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect()
}
