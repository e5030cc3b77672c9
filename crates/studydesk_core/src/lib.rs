//! Core domain logic for StudyDesk.
//! This crate is the single source of truth for library and index invariants.

pub mod ai;
pub mod config;
pub mod desk;
pub mod index;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod task;
pub mod text;

pub use ai::{GeminiClient, GeneratedExercise, LanguageModel, ModelError, ModelResult};
pub use config::{AppConfig, ModelConfig};
pub use desk::{DeskError, DeskEvent, DeskResult, StudyDesk};
pub use index::{IndexError, IndexResult, IndexStore, RecoveryPolicy};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::index::{DashboardCounts, Index};
pub use model::note::{KindFilter, NoteEntry, NoteKind};
pub use repo::note_files::{FsNoteFiles, NoteFiles};
pub use service::calendar_service::{CalendarError, CalendarService};
pub use service::library_service::{LibraryError, LibraryReader, LibraryResult, LibraryService};
pub use service::settings_service::SettingsService;
pub use task::{TaskCompletion, TaskHandle, TaskId, TaskKind, TaskRunner};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
