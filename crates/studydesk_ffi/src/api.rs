//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Route every call through the one process-wide `StudyDesk`.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - All index and notes-directory writes happen under the desk mutex.
//! - Failures carry the core's stable `error_code` next to a readable message.

use log::error;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use studydesk_core::service::calendar_service::parse_date_key;
use studydesk_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, AppConfig, DeskError,
    DeskEvent, KindFilter, NoteEntry, StudyDesk, TaskHandle,
};

static DESK: OnceLock<Mutex<Option<StudyDesk>>> = OnceLock::new();

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One tracked note or exercise sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub subject: String,
    pub name: String,
    /// Managed file path, for the viewer.
    pub path: String,
    /// `note|exercise`.
    pub kind: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
    /// Stable failure code, `None` on success.
    pub error_code: Option<String>,
}

/// Response carrying at most one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteResponse {
    pub ok: bool,
    pub note: Option<NoteItem>,
    pub message: String,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListResponse {
    pub ok: bool,
    pub items: Vec<NoteItem>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardCountsResponse {
    pub ok: bool,
    pub subjects: u32,
    pub notes: u32,
    pub exercises: u32,
    pub message: String,
}

/// Response for background task submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSubmitResponse {
    pub ok: bool,
    /// Identifier echoed back by the matching event.
    pub task_id: Option<String>,
    pub message: String,
    pub error_code: Option<String>,
}

/// One delivered background outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEventItem {
    pub task_id: String,
    /// `query_answered|exercise_ready|task_failed`.
    pub event: String,
    /// Answer text or failure description; empty for `exercise_ready`.
    pub text: String,
    /// Registered sheet for `exercise_ready`.
    pub note: Option<NoteItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEventResponse {
    pub ok: bool,
    pub events: Vec<TaskEventItem>,
    pub message: String,
}

struct FfiFailure {
    code: String,
    message: String,
}

impl From<DeskError> for FfiFailure {
    fn from(value: DeskError) -> Self {
        Self {
            code: value.code().to_string(),
            message: value.to_string(),
        }
    }
}

impl ActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            error_code: None,
        }
    }

    fn failure(op: &str, failure: FfiFailure) -> Self {
        Self {
            ok: false,
            message: format!("{op} failed: {}", failure.message),
            error_code: Some(failure.code),
        }
    }
}

impl NoteResponse {
    fn success(message: impl Into<String>, entry: &NoteEntry) -> Self {
        Self {
            ok: true,
            note: Some(to_note_item(entry)),
            message: message.into(),
            error_code: None,
        }
    }

    fn failure(op: &str, failure: FfiFailure) -> Self {
        Self {
            ok: false,
            note: None,
            message: format!("{op} failed: {}", failure.message),
            error_code: Some(failure.code),
        }
    }
}

impl TaskSubmitResponse {
    fn from_result(op: &str, result: Result<TaskHandle, FfiFailure>) -> Self {
        match result {
            Ok(handle) => Self {
                ok: true,
                task_id: Some(handle.id.to_string()),
                message: "Submitted.".to_string(),
                error_code: None,
            },
            Err(failure) => Self {
                ok: false,
                task_id: None,
                message: format!("{op} failed: {}", failure.message),
                error_code: Some(failure.code),
            },
        }
    }
}

/// Points the process-wide desk at `home` instead of `STUDYDESK_HOME`.
///
/// # FFI contract
/// - Replaces any previously opened desk; pending task events are discarded.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn desk_open_home(home: String) -> ActionResponse {
    let home = home.trim();
    if home.is_empty() {
        return ActionResponse {
            ok: false,
            message: "desk_open_home failed: home must not be empty".to_string(),
            error_code: Some("invalid_home".to_string()),
        };
    }

    let config = AppConfig::with_home(home);
    let mut slot = desk_slot();
    match StudyDesk::open(&config) {
        Ok(desk) => {
            *slot = Some(desk);
            ActionResponse::success("Desk opened.")
        }
        Err(err) => ActionResponse::failure("desk_open_home", err.into()),
    }
}

/// Copies a file into the managed library under `subject`.
///
/// # FFI contract
/// - Sync call, file-system backed.
/// - Never panics.
/// - Returns the created entry on success.
#[flutter_rust_bridge::frb(sync)]
pub fn library_import(source_path: String, subject: String) -> NoteResponse {
    let source = PathBuf::from(source_path.trim());
    match with_desk(|desk| desk.import_file(&source, &subject)) {
        Ok(entry) => NoteResponse::success("Imported.", &entry),
        Err(failure) => NoteResponse::failure("library_import", failure),
    }
}

/// Deletes one note file and its entry.
///
/// # FFI contract
/// - Never panics.
/// - Deleting an untracked note succeeds with a "Nothing to delete." message.
#[flutter_rust_bridge::frb(sync)]
pub fn library_delete(subject: String, name: String) -> ActionResponse {
    match with_desk(|desk| desk.delete_note(&subject, &name)) {
        Ok(true) => ActionResponse::success("Deleted."),
        Ok(false) => ActionResponse::success("Nothing to delete."),
        Err(failure) => ActionResponse::failure("library_delete", failure),
    }
}

/// Opens a note for viewing and as context for `ai_submit_query`.
#[flutter_rust_bridge::frb(sync)]
pub fn library_open(subject: String, name: String) -> NoteResponse {
    let opened = with_desk(|desk| {
        desk.open_note(&subject, &name)?;
        Ok(desk.current_note())
    });
    match opened {
        Ok(Some(entry)) => NoteResponse::success("Opened.", &entry),
        Ok(None) => NoteResponse::failure(
            "library_open",
            FfiFailure {
                code: "not_found".to_string(),
                message: format!("note not found: {subject}/{name}"),
            },
        ),
        Err(failure) => NoteResponse::failure("library_open", failure),
    }
}

/// Lists entries of `subject`, or of every subject when `subject` is `None`.
///
/// Input semantics:
/// - `filter`: `all|notes|exercises`; blank means `all`.
#[flutter_rust_bridge::frb(sync)]
pub fn library_list(subject: Option<String>, filter: String) -> NoteListResponse {
    let Some(filter) = parse_filter(&filter) else {
        return NoteListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("library_list failed: unknown filter `{}`", filter.trim()),
        };
    };

    let listed = with_desk(|desk| {
        Ok(match subject.as_deref().map(str::trim) {
            Some(subject) if !subject.is_empty() => desk.list_by_subject(subject, filter),
            _ => desk.list_all(filter),
        })
    });
    note_list_response("library_list", listed)
}

/// Case-insensitive search over note and subject names.
#[flutter_rust_bridge::frb(sync)]
pub fn library_search(query: String, filter: String) -> NoteListResponse {
    let Some(filter) = parse_filter(&filter) else {
        return NoteListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("library_search failed: unknown filter `{}`", filter.trim()),
        };
    };
    note_list_response("library_search", with_desk(|desk| Ok(desk.search(&query, filter))))
}

/// All subject labels, empty subjects included.
#[flutter_rust_bridge::frb(sync)]
pub fn library_subjects() -> Vec<String> {
    with_desk(|desk| Ok(desk.subjects())).unwrap_or_default()
}

/// Figures for the dashboard cards.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_counts() -> DashboardCountsResponse {
    match with_desk(|desk| Ok(desk.load_dashboard_counts())) {
        Ok(counts) => DashboardCountsResponse {
            ok: true,
            subjects: saturating_u32(counts.subjects),
            notes: saturating_u32(counts.notes),
            exercises: saturating_u32(counts.exercises),
            message: String::new(),
        },
        Err(failure) => DashboardCountsResponse {
            ok: false,
            subjects: 0,
            notes: 0,
            exercises: 0,
            message: format!("dashboard_counts failed: {}", failure.message),
        },
    }
}

/// Saves the note for one `YYYY-MM-DD` day; blank text removes it.
#[flutter_rust_bridge::frb(sync)]
pub fn calendar_set_note(date: String, text: String) -> ActionResponse {
    let saved = with_desk(|desk| {
        let date = parse_date_key(&date).map_err(DeskError::from)?;
        desk.set_calendar_note(date, &text)
    });
    match saved {
        Ok(Some(_)) => ActionResponse::success("Saved."),
        Ok(None) => ActionResponse::success("Removed."),
        Err(failure) => ActionResponse::failure("calendar_set_note", failure),
    }
}

/// Note for one `YYYY-MM-DD` day, `None` when empty or the date is invalid.
#[flutter_rust_bridge::frb(sync)]
pub fn calendar_get_note(date: String) -> Option<String> {
    with_desk(|desk| {
        let date = parse_date_key(&date).map_err(DeskError::from)?;
        Ok(desk.calendar_note(date))
    })
    .ok()
    .flatten()
}

/// Stores the model API key; blank input clears it.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_set_api_key(key: String) -> ActionResponse {
    match with_desk(|desk| desk.set_api_key(&key)) {
        Ok(true) => ActionResponse::success("API key saved."),
        Ok(false) => ActionResponse::success("API key cleared."),
        Err(failure) => ActionResponse::failure("settings_set_api_key", failure),
    }
}

/// Asks a question about the open note in the background.
///
/// # FFI contract
/// - Returns immediately; the answer arrives through `ai_poll_events`.
/// - Submitting again before the answer arrives supersedes the earlier query.
#[flutter_rust_bridge::frb(sync)]
pub fn ai_submit_query(question: String) -> TaskSubmitResponse {
    TaskSubmitResponse::from_result(
        "ai_submit_query",
        with_desk(|desk| desk.submit_query(&question)),
    )
}

/// Generates an exercise sheet from one note in the background.
#[flutter_rust_bridge::frb(sync)]
pub fn ai_submit_generation(subject: String, name: String) -> TaskSubmitResponse {
    TaskSubmitResponse::from_result(
        "ai_submit_generation",
        with_desk(|desk| desk.submit_generation(&subject, &name)),
    )
}

/// Drains finished background tasks without blocking.
#[flutter_rust_bridge::frb(sync)]
pub fn ai_poll_events() -> TaskEventResponse {
    match with_desk(|desk| Ok(desk.poll_events())) {
        Ok(events) => TaskEventResponse {
            ok: true,
            events: events.into_iter().map(to_task_event_item).collect(),
            message: String::new(),
        },
        Err(failure) => TaskEventResponse {
            ok: false,
            events: Vec::new(),
            message: format!("ai_poll_events failed: {}", failure.message),
        },
    }
}

fn desk_slot() -> MutexGuard<'static, Option<StudyDesk>> {
    DESK.get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn with_desk<T>(
    f: impl FnOnce(&mut StudyDesk) -> Result<T, DeskError>,
) -> Result<T, FfiFailure> {
    let mut slot = desk_slot();
    if slot.is_none() {
        let desk = StudyDesk::open(&AppConfig::from_env()).map_err(|err| {
            error!(
                "event=desk_open module=ffi status=error error_code={}",
                err.code()
            );
            FfiFailure::from(err)
        })?;
        *slot = Some(desk);
    }
    let desk = slot.as_mut().ok_or_else(|| FfiFailure {
        code: "desk_unavailable".to_string(),
        message: "desk is not open".to_string(),
    })?;
    f(desk).map_err(FfiFailure::from)
}

fn parse_filter(raw: &str) -> Option<KindFilter> {
    if raw.trim().is_empty() {
        return Some(KindFilter::All);
    }
    KindFilter::parse(raw)
}

fn note_list_response(op: &str, listed: Result<Vec<NoteEntry>, FfiFailure>) -> NoteListResponse {
    match listed {
        Ok(entries) => {
            let items = entries.iter().map(to_note_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No notes.".to_string()
            } else {
                format!("Found {} note(s).", items.len())
            };
            NoteListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(failure) => NoteListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("{op} failed: {}", failure.message),
        },
    }
}

fn to_note_item(entry: &NoteEntry) -> NoteItem {
    NoteItem {
        subject: entry.subject.clone(),
        name: entry.name.clone(),
        path: entry.path.display().to_string(),
        kind: entry.kind.as_str().to_string(),
    }
}

fn to_task_event_item(event: DeskEvent) -> TaskEventItem {
    let task_id = event.task_id().to_string();
    match event {
        DeskEvent::QueryAnswered { answer, .. } => TaskEventItem {
            task_id,
            event: "query_answered".to_string(),
            text: answer,
            note: None,
        },
        DeskEvent::ExerciseReady { entry, .. } => TaskEventItem {
            task_id,
            event: "exercise_ready".to_string(),
            text: String::new(),
            note: Some(to_note_item(&entry)),
        },
        DeskEvent::TaskFailed { message, .. } => TaskEventItem {
            task_id,
            event: "task_failed".to_string(),
            text: message,
            note: None,
        },
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{
        ai_poll_events, ai_submit_generation, ai_submit_query, calendar_get_note,
        calendar_set_note, core_version, dashboard_counts, desk_open_home, init_logging,
        library_delete, library_import, library_list, library_open, library_search,
        library_subjects, settings_set_api_key,
    };

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn unknown_filter_is_rejected_before_touching_the_desk() {
        let response = library_list(None, "pictures".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("pictures"));
    }

    // The desk is process-wide, so the whole flow runs in one test.
    #[test]
    fn library_flow_through_the_process_desk() {
        let home = tempfile::tempdir().expect("temp home");
        assert!(!desk_open_home("  ".to_string()).ok);
        let opened = desk_open_home(home.path().display().to_string());
        assert!(opened.ok, "{}", opened.message);

        let source = home.path().join("lecture1.txt");
        std::fs::write(&source, "limits").expect("write source");
        let imported = library_import(source.display().to_string(), "Math".to_string());
        assert!(imported.ok, "{}", imported.message);
        let note = imported.note.expect("imported note");
        assert_eq!(note.name, "lecture1.txt");
        assert_eq!(note.kind, "note");
        assert!(note.path.ends_with("Math_lecture1.txt"));

        let missing = library_import(
            home.path().join("ghost.txt").display().to_string(),
            "Math".to_string(),
        );
        assert!(!missing.ok);
        assert_eq!(missing.error_code.as_deref(), Some("source_not_found"));

        let listed = library_list(Some("Math".to_string()), "notes".to_string());
        assert_eq!(listed.items, vec![note.clone()]);
        assert_eq!(library_search("LECT".to_string(), String::new()).items.len(), 1);
        assert_eq!(library_subjects(), vec!["Math".to_string()]);

        let counts = dashboard_counts();
        assert!(counts.ok);
        assert_eq!((counts.subjects, counts.notes, counts.exercises), (1, 1, 0));

        let no_key = ai_submit_generation("Math".to_string(), "lecture1.txt".to_string());
        assert_eq!(no_key.error_code.as_deref(), Some("missing_api_key"));
        let no_note = ai_submit_query("what?".to_string());
        assert_eq!(no_note.error_code.as_deref(), Some("no_open_note"));
        assert!(library_open("Math".to_string(), "lecture1.txt".to_string()).ok);
        assert!(settings_set_api_key(" key ".to_string()).ok);
        let blank = ai_submit_query("   ".to_string());
        assert_eq!(blank.error_code.as_deref(), Some("empty_question"));
        let polled = ai_poll_events();
        assert!(polled.ok);
        assert!(polled.events.is_empty());

        assert!(calendar_set_note("2024-06-03".to_string(), "exam".to_string()).ok);
        assert_eq!(calendar_get_note("2024-06-03".to_string()).as_deref(), Some("exam"));
        let bad_date = calendar_set_note("2024-6-3".to_string(), "x".to_string());
        assert_eq!(bad_date.error_code.as_deref(), Some("invalid_date"));

        let deleted = library_delete("Math".to_string(), "lecture1.txt".to_string());
        assert_eq!(deleted.message, "Deleted.");
        let again = library_delete("Math".to_string(), "lecture1.txt".to_string());
        assert!(again.ok);
        assert_eq!(again.message, "Nothing to delete.");
        assert!(!library_open("Math".to_string(), "lecture1.txt".to_string()).ok);
    }
}
