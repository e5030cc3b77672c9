use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use studydesk_core::{
    FsNoteFiles, IndexStore, KindFilter, LibraryError, LibraryService, NoteFiles, NoteKind,
    RecoveryPolicy,
};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    store: IndexStore,
    files: FsNoteFiles,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::open(dir.path().join("study_data.json"), RecoveryPolicy::Fail)
            .unwrap();
        let files = FsNoteFiles::new(dir.path().join("notes_library"));
        Self { dir, store, files }
    }

    fn source(&self, name: &str, contents: &str) -> PathBuf {
        let inbox = self.dir.path().join("inbox");
        fs::create_dir_all(&inbox).unwrap();
        let path = inbox.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn library(&mut self) -> LibraryService<'_, FsNoteFiles> {
        LibraryService::new(&mut self.store, &self.files)
    }

    fn assert_consistent(&self) {
        let indexed = self
            .store
            .index()
            .entries()
            .map(|entry| entry.path)
            .collect::<BTreeSet<_>>();
        let live = match fs::read_dir(self.files.root()) {
            Ok(entries) => entries
                .map(|entry| entry.unwrap().path())
                .collect::<BTreeSet<_>>(),
            Err(_) => BTreeSet::new(),
        };
        assert_eq!(indexed, live);
    }
}

/// Fails every copy, as if the source vanished mid-call.
struct VanishingSource(FsNoteFiles);

impl NoteFiles for VanishingSource {
    fn root(&self) -> &Path {
        self.0.root()
    }

    fn copy_in(&self, source: &Path, _file_name: &str) -> io::Result<PathBuf> {
        fs::remove_file(source)?;
        Err(io::Error::new(io::ErrorKind::NotFound, "source vanished"))
    }

    fn write(&self, file_name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        self.0.write(file_name, contents)
    }

    fn remove(&self, path: &Path) -> io::Result<bool> {
        self.0.remove(path)
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        self.0.read_text(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.0.exists(path)
    }
}

#[test]
fn import_into_new_subject_is_indexed_and_counted() {
    let mut fx = Fixture::new();
    let source = fx.source("lecture1.txt", "limits and continuity");

    let entry = fx.library().import(&source, "Math").unwrap();

    assert_eq!(entry.name, "lecture1.txt");
    assert_eq!(entry.subject, "Math");
    assert_eq!(entry.kind, NoteKind::Note);
    assert!(entry.path.ends_with("Math_lecture1.txt"));
    assert_eq!(fs::read_to_string(&entry.path).unwrap(), "limits and continuity");

    let counts = fx.store.index().counts();
    assert_eq!(counts.subjects, 1);
    assert_eq!(counts.notes, 1);
    assert_eq!(counts.exercises, 0);
    assert!(fx.store.index().subjects["Math"].contains_key("lecture1.txt"));
    fx.assert_consistent();
}

#[test]
fn imports_survive_reopen() {
    let mut fx = Fixture::new();
    let source = fx.source("lecture1.txt", "x");
    fx.library().import(&source, "Math").unwrap();

    let reopened =
        IndexStore::open(fx.dir.path().join("study_data.json"), RecoveryPolicy::Fail).unwrap();
    assert_eq!(reopened.index(), fx.store.index());
}

#[test]
fn missing_source_is_rejected_without_index_change() {
    let mut fx = Fixture::new();
    let before = fx.store.index().clone();
    let missing = fx.dir.path().join("nope.txt");

    let err = fx.library().import(&missing, "Math").unwrap_err();

    assert!(matches!(err, LibraryError::SourceNotFound(_)));
    assert_eq!(fx.store.index(), &before);
    fx.assert_consistent();
}

#[test]
fn failed_copy_leaves_index_untouched() {
    let fx = Fixture::new();
    let source = fx.source("lecture2.txt", "series");
    let Fixture {
        dir, mut store, files,
    } = fx;
    let before = store.index().clone();
    let vanishing = VanishingSource(files);

    let err = LibraryService::new(&mut store, &vanishing)
        .import(&source, "Math")
        .unwrap_err();

    assert!(matches!(err, LibraryError::SourceNotFound(_)));
    assert_eq!(store.index(), &before);
    assert!(!dir.path().join("study_data.json").exists());
}

#[test]
fn blank_subject_is_rejected() {
    let mut fx = Fixture::new();
    let source = fx.source("a.txt", "a");
    let err = fx.library().import(&source, "   ").unwrap_err();
    assert_eq!(err.code(), "invalid_subject");
}

#[test]
fn delete_twice_matches_delete_once() {
    let mut fx = Fixture::new();
    let source = fx.source("lecture1.txt", "x");
    let entry = fx.library().import(&source, "Math").unwrap();

    assert!(fx.library().delete("Math", "lecture1.txt").unwrap());
    let after_first = fx.store.index().clone();
    assert!(!fx.library().delete("Math", "lecture1.txt").unwrap());

    assert_eq!(fx.store.index(), &after_first);
    assert!(!entry.path.exists());
    assert!(fx.store.index().subjects.contains_key("Math"));
    fx.assert_consistent();
}

#[test]
fn delete_tolerates_manually_removed_file() {
    let mut fx = Fixture::new();
    let source = fx.source("lecture1.txt", "x");
    let entry = fx.library().import(&source, "Math").unwrap();
    fs::remove_file(&entry.path).unwrap();

    assert_eq!(fx.library().reader().missing_files().len(), 1);
    assert!(fx.library().delete("Math", "lecture1.txt").unwrap());
    assert!(fx.store.index().entry("Math", "lecture1.txt").is_none());
    fx.assert_consistent();
}

#[test]
fn reimport_overwrites_file_and_entry() {
    let mut fx = Fixture::new();
    let source = fx.source("lecture1.txt", "first");
    fx.library().import(&source, "Math").unwrap();
    fs::write(&source, "second").unwrap();

    let entry = fx.library().import(&source, "Math").unwrap();

    assert_eq!(fs::read_to_string(&entry.path).unwrap(), "second");
    assert_eq!(fx.store.index().counts().notes, 1);
    fx.assert_consistent();
}

#[test]
fn colliding_derived_names_keep_one_entry() {
    let mut fx = Fixture::new();
    // "A_B" + "c.txt" and "A" + "B_c.txt" derive the same managed name.
    let first = fx.source("c.txt", "one");
    fx.library().import(&first, "A_B").unwrap();
    let second = fx.source("B_c.txt", "two");
    let entry = fx.library().import(&second, "A").unwrap();

    let entries = fx.library().reader().list_all(KindFilter::All);
    assert_eq!(entries, vec![entry]);
    fx.assert_consistent();
}

#[test]
fn listing_filters_by_kind_and_sorts_by_name() {
    let mut fx = Fixture::new();
    for name in ["b.txt", "a.txt"] {
        let source = fx.source(name, name);
        fx.library().import(&source, "Math").unwrap();
    }
    fx.library()
        .register_generated("Math", "GENERATED_a.html", "<p>q</p>")
        .unwrap();

    let mut names = |filter| {
        fx.library()
            .reader()
            .list_by_subject("Math", filter)
            .into_iter()
            .map(|entry| entry.name)
            .collect::<Vec<_>>()
    };
    assert_eq!(
        names(KindFilter::All),
        ["GENERATED_a.html", "a.txt", "b.txt"]
    );
    assert_eq!(names(KindFilter::NotesOnly), ["a.txt", "b.txt"]);
    assert_eq!(names(KindFilter::ExercisesOnly), ["GENERATED_a.html"]);
    assert!(fx
        .library()
        .reader()
        .list_by_subject("Physics", KindFilter::All)
        .is_empty());
}

#[test]
fn resolve_unknown_note_is_not_found() {
    let mut fx = Fixture::new();
    let err = fx.library().reader().resolve("Math", "ghost.txt").unwrap_err();
    assert!(matches!(err, LibraryError::NotFound { .. }));
}

#[test]
fn search_matches_name_or_subject_case_insensitively() {
    let mut fx = Fixture::new();
    let integrals = fx.source("Integrals.html", "<p>int</p>");
    fx.library().import(&integrals, "Math").unwrap();
    let waves = fx.source("waves.txt", "w");
    fx.library().import(&waves, "Physics").unwrap();

    let hits = |query: &str, fx: &mut Fixture| {
        fx.library()
            .reader()
            .search(query, KindFilter::All)
            .into_iter()
            .map(|entry| entry.name)
            .collect::<Vec<_>>()
    };
    assert_eq!(hits("INTEG", &mut fx), ["Integrals.html"]);
    assert_eq!(hits("phys", &mut fx), ["waves.txt"]);
    assert_eq!(hits("", &mut fx).len(), 2);
}

#[test]
fn note_text_is_extracted_from_html() {
    let mut fx = Fixture::new();
    let source = fx.source("l.html", "<h1>Limits</h1><script>x()</script><p>a &amp; b</p>");
    fx.library().import(&source, "Math").unwrap();

    let text = fx.library().reader().read_note_text("Math", "l.html").unwrap();
    assert_eq!(text, "Limits a & b");
}

#[test]
fn register_generated_counts_as_exercise() {
    let mut fx = Fixture::new();
    let entry = fx
        .library()
        .register_generated("Other", "GENERATED_Derivatives.html", "<p>ok</p>")
        .unwrap();

    assert_eq!(entry.kind, NoteKind::Exercise);
    assert_eq!(fs::read_to_string(&entry.path).unwrap(), "<p>ok</p>");
    let counts = fx.library().reader().dashboard_counts();
    assert_eq!((counts.subjects, counts.notes, counts.exercises), (1, 0, 1));
    fx.assert_consistent();
}

#[test]
fn empty_subject_stays_listed() {
    let mut fx = Fixture::new();
    assert!(fx.library().ensure_subject("History").unwrap());
    assert!(!fx.library().ensure_subject(" History ").unwrap());
    assert_eq!(fx.library().reader().subjects(), ["History"]);
    assert_eq!(fx.store.index().counts().subjects, 1);
}

/// Store whose data-file parent gets replaced by a plain file after opening,
/// so every save fails.
fn unsavable_store(dir: &TempDir) -> IndexStore {
    let parent = dir.path().join("data");
    let store = IndexStore::open(parent.join("study_data.json"), RecoveryPolicy::Fail).unwrap();
    fs::write(&parent, "file, not a directory").unwrap();
    store
}

fn notes_left(files: &FsNoteFiles) -> Vec<PathBuf> {
    match fs::read_dir(files.root()) {
        Ok(entries) => entries.map(|entry| entry.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn failed_index_save_removes_fresh_import() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = unsavable_store(&dir);
    let files = FsNoteFiles::new(dir.path().join("notes_library"));
    let source = dir.path().join("lecture1.txt");
    fs::write(&source, "limits").unwrap();
    let before = store.index().clone();

    let err = LibraryService::new(&mut store, &files)
        .import(&source, "Math")
        .unwrap_err();

    assert_eq!(err.code(), "index_io");
    assert!(notes_left(&files).is_empty());
    assert_eq!(store.index(), &before);
    assert!(source.exists());
}

#[test]
fn failed_index_save_removes_fresh_generated_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = unsavable_store(&dir);
    let files = FsNoteFiles::new(dir.path().join("notes_library"));
    let before = store.index().clone();

    let err = LibraryService::new(&mut store, &files)
        .register_generated("Other", "GENERATED_a.html", "<p>q</p>")
        .unwrap_err();

    assert_eq!(err.code(), "index_io");
    assert!(notes_left(&files).is_empty());
    assert_eq!(store.index(), &before);
}

#[test]
fn subject_is_trimmed_for_lookup_listing_and_delete() {
    let mut fx = Fixture::new();
    let source = fx.source("lecture1.txt", "x");
    let entry = fx.library().import(&source, " Math ").unwrap();

    assert_eq!(fx.library().reader().resolve("  Math", "lecture1.txt").unwrap(), entry.path);
    assert_eq!(
        fx.library()
            .reader()
            .list_by_subject("Math  ", KindFilter::All),
        vec![entry.clone()]
    );
    assert!(fx.library().delete(" Math ", "lecture1.txt").unwrap());
    assert!(!entry.path.exists());
    assert!(fx.store.index().entry("Math", "lecture1.txt").is_none());
    fx.assert_consistent();
}

#[test]
fn plain_text_note_keeps_comparisons() {
    let mut fx = Fixture::new();
    let source = fx.source("lecture1.txt", "Solve for x<3 and y>5.\nThen check x<y.");
    fx.library().import(&source, "Math").unwrap();

    let text = fx.library().reader().read_note_text("Math", "lecture1.txt").unwrap();
    assert_eq!(text, "Solve for x<3 and y>5. Then check x<y.");
}

#[test]
fn html_note_decodes_named_entities() {
    let mut fx = Fixture::new();
    let source = fx.source("t.html", "<p>&eacute;t&eacute; &mdash; 1 &lt; 2</p>");
    fx.library().import(&source, "French").unwrap();

    let text = fx.library().reader().read_note_text("French", "t.html").unwrap();
    assert_eq!(text, "\u{e9}t\u{e9} \u{2014} 1 < 2");
}
