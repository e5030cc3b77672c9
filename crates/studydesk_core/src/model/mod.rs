//! Domain model for the study library.
//!
//! # Responsibility
//! - Define the persisted aggregate (`Index`) and the records it tracks.
//! - Keep note kind explicit instead of inferring it from file names.
//!
//! # Invariants
//! - Subject and note names are map keys; they are unique by construction.
//! - Every tracked entry points at a file inside the managed notes directory.

pub mod index;
pub mod note;
