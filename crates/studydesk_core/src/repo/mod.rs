//! File access behind the managed notes directory.
//!
//! # Responsibility
//! - Define the file operations the library service relies on.
//! - Keep direct filesystem calls out of service orchestration.
//!
//! # Invariants
//! - Files are only created inside the managed directory root.
//! - Removing an already-absent file is not an error.

pub mod note_files;
