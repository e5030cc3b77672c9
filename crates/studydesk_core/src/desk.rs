//! Single-writer facade used by every presentation surface.
//!
//! # Responsibility
//! - Own the index store, the managed notes directory, the task runner and
//!   the model, and expose the dashboard use-cases over them.
//! - Turn background completions into `DeskEvent`s on the owning thread.
//!
//! # Invariants
//! - Only the owner of a `StudyDesk` mutates the index or the notes
//!   directory; worker jobs receive copies of what they need and return
//!   plain values.
//! - Every accepted submission yields exactly one event. A generated sheet
//!   that cannot be registered is reported as `TaskFailed`.

use crate::ai::{exercise, query, GeminiClient, GeneratedExercise, LanguageModel, ModelError};
use crate::config::{AppConfig, DEFAULT_GENERATED_SUBJECT};
use crate::index::{IndexError, IndexStore};
use crate::model::index::DashboardCounts;
use crate::model::note::{KindFilter, NoteEntry};
use crate::repo::note_files::{FsNoteFiles, NoteFiles};
use crate::service::calendar_service::{self, CalendarError, CalendarService};
use crate::service::library_service::{LibraryError, LibraryReader, LibraryService};
use crate::service::settings_service::SettingsService;
use crate::task::{TaskCompletion, TaskHandle, TaskId, TaskKind, TaskRunner};
use chrono::NaiveDate;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub type DeskResult<T> = Result<T, DeskError>;

/// Error returned by desk use-cases.
#[derive(Debug)]
pub enum DeskError {
    Library(LibraryError),
    Index(IndexError),
    Calendar(CalendarError),
    Model(ModelError),
    /// A question was asked with no note open.
    NoOpenNote,
    EmptyQuestion,
    /// An AI feature was used before an API key was stored.
    MissingApiKey,
}

impl Display for DeskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Library(err) => write!(f, "{err}"),
            Self::Index(err) => write!(f, "{err}"),
            Self::Calendar(err) => write!(f, "{err}"),
            Self::Model(err) => write!(f, "{err}"),
            Self::NoOpenNote => write!(f, "no note is open"),
            Self::EmptyQuestion => write!(f, "question is empty"),
            Self::MissingApiKey => write!(f, "no API key configured"),
        }
    }
}

impl Error for DeskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Library(err) => Some(err),
            Self::Index(err) => Some(err),
            Self::Calendar(err) => Some(err),
            Self::Model(err) => Some(err),
            Self::NoOpenNote | Self::EmptyQuestion | Self::MissingApiKey => None,
        }
    }
}

impl From<LibraryError> for DeskError {
    fn from(value: LibraryError) -> Self {
        Self::Library(value)
    }
}

impl From<IndexError> for DeskError {
    fn from(value: IndexError) -> Self {
        Self::Index(value)
    }
}

impl From<CalendarError> for DeskError {
    fn from(value: CalendarError) -> Self {
        Self::Calendar(value)
    }
}

impl From<ModelError> for DeskError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl DeskError {
    /// Stable code used in log lines and FFI envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Library(err) => err.code(),
            Self::Index(err) => err.code(),
            Self::Calendar(CalendarError::InvalidDate(_)) => "invalid_date",
            Self::Calendar(CalendarError::InvalidMonth { .. }) => "invalid_month",
            Self::Calendar(CalendarError::Index(err)) => err.code(),
            Self::Model(err) => err.code(),
            Self::NoOpenNote => "no_open_note",
            Self::EmptyQuestion => "empty_question",
            Self::MissingApiKey => "missing_api_key",
        }
    }
}

/// Outcome of one background task, delivered by `poll_events`/`wait_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskEvent {
    QueryAnswered {
        task_id: TaskId,
        answer: String,
    },
    /// The sheet was written and indexed.
    ExerciseReady {
        task_id: TaskId,
        entry: NoteEntry,
    },
    TaskFailed {
        task_id: TaskId,
        kind: TaskKind,
        message: String,
    },
}

impl DeskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::QueryAnswered { task_id, .. }
            | Self::ExerciseReady { task_id, .. }
            | Self::TaskFailed { task_id, .. } => *task_id,
        }
    }
}

#[derive(Debug)]
enum TaskOutput {
    Answer(String),
    Exercise(GeneratedExercise),
}

/// The dashboard core.
pub struct StudyDesk<F: NoteFiles = FsNoteFiles> {
    store: IndexStore,
    files: F,
    tasks: TaskRunner<TaskOutput>,
    model: Arc<dyn LanguageModel>,
    generated_subject: String,
    open_note: Option<(String, String)>,
}

impl StudyDesk<FsNoteFiles> {
    /// Opens the data file and notes directory named by `config`.
    pub fn open(config: &AppConfig) -> DeskResult<Self> {
        let store = IndexStore::open(&config.data_file, config.recovery)?;
        let model = GeminiClient::new(&config.model)?;
        let mut desk = Self::with_parts(
            store,
            FsNoteFiles::new(&config.notes_dir),
            Arc::new(model),
        );
        desk.generated_subject = config.generated_subject.clone();

        let missing = desk.library_view(|library| library.missing_files().len());
        if missing > 0 {
            warn!(
                "event=desk_open module=desk status=ok missing_files={}",
                missing
            );
        }
        Ok(desk)
    }
}

impl<F: NoteFiles> StudyDesk<F> {
    /// Assembles a desk from explicit collaborators.
    pub fn with_parts(store: IndexStore, files: F, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            store,
            files,
            tasks: TaskRunner::new(),
            model,
            generated_subject: DEFAULT_GENERATED_SUBJECT.to_string(),
            open_note: None,
        }
    }

    /// Sets the subject generated sheets are filed under.
    pub fn set_generated_subject(&mut self, subject: impl Into<String>) {
        self.generated_subject = subject.into();
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn import_file(&mut self, source: &Path, subject: &str) -> DeskResult<NoteEntry> {
        Ok(self.library().import(source, subject)?)
    }

    /// Deletes one entry; `Ok(false)` when it was not tracked.
    pub fn delete_note(&mut self, subject: &str, name: &str) -> DeskResult<bool> {
        let deleted = self.library().delete(subject, name)?;
        if deleted && self.is_open(subject, name) {
            self.open_note = None;
        }
        Ok(deleted)
    }

    /// Resolves a note and makes it the context for `submit_query`.
    pub fn open_note(&mut self, subject: &str, name: &str) -> DeskResult<PathBuf> {
        let path = self.library_view(|library| library.resolve(subject, name))?;
        self.open_note = Some((subject.to_string(), name.to_string()));
        Ok(path)
    }

    pub fn close_note(&mut self) {
        self.open_note = None;
    }

    pub fn current_note(&self) -> Option<NoteEntry> {
        self.open_note
            .as_ref()
            .and_then(|(subject, name)| self.store.index().entry(subject, name))
    }

    pub fn list_by_subject(&self, subject: &str, filter: KindFilter) -> Vec<NoteEntry> {
        self.library_view(|library| library.list_by_subject(subject, filter))
    }

    pub fn list_all(&self, filter: KindFilter) -> Vec<NoteEntry> {
        self.library_view(|library| library.list_all(filter))
    }

    pub fn subjects(&self) -> Vec<String> {
        self.library_view(|library| library.subjects())
    }

    pub fn add_subject(&mut self, subject: &str) -> DeskResult<bool> {
        Ok(self.library().ensure_subject(subject)?)
    }

    pub fn search(&self, query: &str, filter: KindFilter) -> Vec<NoteEntry> {
        self.library_view(|library| library.search(query, filter))
    }

    pub fn load_dashboard_counts(&self) -> DashboardCounts {
        self.store.index().counts()
    }

    /// Stores the API key; returns whether one is configured afterwards.
    pub fn set_api_key(&mut self, key: &str) -> DeskResult<bool> {
        Ok(SettingsService::new(&mut self.store).set_api_key(key)?)
    }

    pub fn has_api_key(&self) -> bool {
        self.store.index().api_key.is_some()
    }

    pub fn set_calendar_note(&mut self, date: NaiveDate, text: &str) -> DeskResult<Option<String>> {
        Ok(CalendarService::new(&mut self.store).set_note(date, text)?)
    }

    pub fn calendar_note(&self, date: NaiveDate) -> Option<String> {
        self.store
            .index()
            .calendar_notes
            .get(&calendar_service::date_key(date))
            .cloned()
    }

    pub fn calendar_month(&self, year: i32, month: u32) -> DeskResult<Vec<(NaiveDate, String)>> {
        Ok(calendar_service::month_notes(self.store.index(), year, month)?)
    }

    /// Asks a question about the open note in the background.
    ///
    /// # Errors
    /// - `EmptyQuestion`, `NoOpenNote` or `MissingApiKey` before anything is
    ///   submitted.
    /// - Library errors when the open note cannot be read.
    pub fn submit_query(&mut self, question: &str) -> DeskResult<TaskHandle> {
        if question.trim().is_empty() {
            return Err(DeskError::EmptyQuestion);
        }
        let (subject, name) = self.open_note.clone().ok_or(DeskError::NoOpenNote)?;
        let api_key = self.require_api_key()?;
        let context = self.library_view(|library| library.read_note_text(&subject, &name))?;

        let model = Arc::clone(&self.model);
        let question = question.to_string();
        let handle = self.tasks.submit(TaskKind::Query, move || {
            query::ask(model.as_ref(), &api_key, &context, &question)
                .map(TaskOutput::Answer)
                .map_err(|err| err.to_string())
        });
        Ok(handle)
    }

    /// Generates an exercise sheet from one note in the background.
    pub fn submit_generation(&mut self, subject: &str, name: &str) -> DeskResult<TaskHandle> {
        let api_key = self.require_api_key()?;
        let source_text = self.library_view(|library| library.read_note_text(subject, name))?;

        let model = Arc::clone(&self.model);
        let title_hint = name.to_string();
        let handle = self.tasks.submit(TaskKind::GenerateExercise, move || {
            exercise::generate(model.as_ref(), &api_key, &source_text, &title_hint)
                .map(TaskOutput::Exercise)
                .map_err(|err| err.to_string())
        });
        Ok(handle)
    }

    pub fn task_in_flight(&self, kind: TaskKind) -> bool {
        self.tasks.in_flight(kind)
    }

    /// Delivers every completion that is ready, without blocking.
    pub fn poll_events(&mut self) -> Vec<DeskEvent> {
        self.tasks
            .poll()
            .into_iter()
            .map(|completion| self.settle(completion))
            .collect()
    }

    /// Blocks up to `timeout` for the next event.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<DeskEvent> {
        self.tasks
            .wait_next(timeout)
            .map(|completion| self.settle(completion))
    }

    fn settle(&mut self, completion: TaskCompletion<TaskOutput>) -> DeskEvent {
        let TaskCompletion { id, kind, outcome } = completion;
        let failed = |message: String| {
            warn!(
                "event=task_failed module=desk status=error kind={} task_id={}",
                kind.as_str(),
                id
            );
            DeskEvent::TaskFailed {
                task_id: id,
                kind,
                message,
            }
        };

        match outcome {
            Ok(TaskOutput::Answer(answer)) => DeskEvent::QueryAnswered {
                task_id: id,
                answer,
            },
            Ok(TaskOutput::Exercise(sheet)) => {
                let subject = self.generated_subject.clone();
                match self
                    .library()
                    .register_generated(&subject, &sheet.name, &sheet.html)
                {
                    Ok(entry) => {
                        info!(
                            "event=exercise_ready module=desk status=ok task_id={}",
                            id
                        );
                        DeskEvent::ExerciseReady { task_id: id, entry }
                    }
                    Err(err) => {
                        error!(
                            "event=exercise_ready module=desk status=error task_id={} error_code={}",
                            id,
                            err.code()
                        );
                        failed(format!("generated sheet could not be saved: {err}"))
                    }
                }
            }
            Err(message) => failed(message),
        }
    }

    fn require_api_key(&self) -> DeskResult<String> {
        self.store
            .index()
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(DeskError::MissingApiKey)
    }

    fn is_open(&self, subject: &str, name: &str) -> bool {
        self.open_note
            .as_ref()
            .is_some_and(|(open_subject, open_name)| open_subject == subject && open_name == name)
    }

    fn library(&mut self) -> LibraryService<'_, F> {
        LibraryService::new(&mut self.store, &self.files)
    }

    fn library_view<T>(&self, read: impl FnOnce(&LibraryReader<'_, F>) -> T) -> T {
        read(&LibraryReader::new(&self.store, &self.files))
    }
}
