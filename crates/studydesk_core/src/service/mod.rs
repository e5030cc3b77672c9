//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate index and file operations into use-case level APIs.
//! - Keep FFI/CLI layers decoupled from persistence details.
//!
//! # Invariants
//! - Services borrow the single `IndexStore`; none of them holds its own copy
//!   of the aggregate.

pub mod calendar_service;
pub mod library_service;
pub mod settings_service;
