//! Command-line front end over the desk core.
//!
//! # Responsibility
//! - Run one library, calendar, settings or AI call per invocation.
//! - Keep output line-oriented for scripting and quick local checks.

use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use studydesk_core::{
    core_version, init_logging_from_config, AppConfig, DeskError, DeskEvent, KindFilter,
    NoteEntry, NoteFiles, StudyDesk, TaskHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FilterArg {
    All,
    Notes,
    Exercises,
}

impl From<FilterArg> for KindFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => Self::All,
            FilterArg::Notes => Self::NotesOnly,
            FilterArg::Exercises => Self::ExercisesOnly,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "studydesk", about = "Study library, calendar and AI helper", version)]
struct Cli {
    /// Directory holding study_data.json and notes_library; defaults to
    /// STUDYDESK_HOME or the current directory.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the core version.
    Version,
    /// Copy a file into the library under a subject.
    Import {
        path: PathBuf,
        #[arg(long, short = 's')]
        subject: String,
    },
    /// Remove a note file and its entry.
    Delete { subject: String, name: String },
    /// List notes of one subject, or of every subject.
    List {
        subject: Option<String>,
        #[arg(long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
        /// Case-insensitive match on note or subject name.
        #[arg(long)]
        search: Option<String>,
    },
    /// Print dashboard counts.
    Counts,
    /// Day notes.
    Calendar {
        #[command(subcommand)]
        action: CalendarCommand,
    },
    /// Store the model API key; an empty key clears it.
    SetKey { key: String },
    /// Ask a question about one note and wait for the answer.
    Ask {
        subject: String,
        name: String,
        question: String,
        #[arg(long, default_value_t = 120)]
        wait_secs: u64,
    },
    /// Generate an exercise sheet from one note and wait for it.
    Generate {
        subject: String,
        name: String,
        #[arg(long, default_value_t = 120)]
        wait_secs: u64,
    },
}

#[derive(Debug, Subcommand)]
enum CalendarCommand {
    /// Save the note for a day; empty text removes it.
    Set {
        #[arg(value_parser = clap::value_parser!(NaiveDate))]
        date: NaiveDate,
        text: String,
    },
    /// Print the note for a day, or every note of its month with --month.
    Show {
        #[arg(value_parser = clap::value_parser!(NaiveDate))]
        date: NaiveDate,
        #[arg(long)]
        month: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Command::Version = cli.command {
        println!("studydesk_core version={}", core_version());
        return ExitCode::SUCCESS;
    }

    let config = resolve_config(cli.home);
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error[{}]: {err}", err.code());
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(home: Option<PathBuf>) -> AppConfig {
    let from_env = AppConfig::from_env();
    match home {
        Some(home) => AppConfig {
            log_level: from_env.log_level,
            recovery: from_env.recovery,
            model: from_env.model,
            generated_subject: from_env.generated_subject,
            ..AppConfig::with_home(home)
        },
        None => from_env,
    }
}

fn run(command: Command, config: &AppConfig) -> Result<ExitCode, DeskError> {
    let mut desk = StudyDesk::open(config)?;

    match command {
        Command::Version => println!("studydesk_core version={}", core_version()),
        Command::Import { path, subject } => {
            let entry = desk.import_file(&path, &subject)?;
            print_entry(&entry);
        }
        Command::Delete { subject, name } => {
            if desk.delete_note(&subject, &name)? {
                println!("deleted {subject}/{name}");
            } else {
                println!("nothing to delete");
            }
        }
        Command::List {
            subject,
            filter,
            search,
        } => {
            let filter = KindFilter::from(filter);
            let entries = match (search, subject) {
                (Some(query), _) => desk.search(&query, filter),
                (None, Some(subject)) => desk.list_by_subject(&subject, filter),
                (None, None) => desk.list_all(filter),
            };
            entries.iter().for_each(print_entry);
        }
        Command::Counts => {
            let counts = desk.load_dashboard_counts();
            println!(
                "subjects={} notes={} exercises={}",
                counts.subjects, counts.notes, counts.exercises
            );
        }
        Command::Calendar { action } => match action {
            CalendarCommand::Set { date, text } => match desk.set_calendar_note(date, &text)? {
                Some(_) => println!("saved {date}"),
                None => println!("removed {date}"),
            },
            CalendarCommand::Show { date, month: false } => {
                if let Some(text) = desk.calendar_note(date) {
                    println!("{date}\t{text}");
                }
            }
            CalendarCommand::Show { date, month: true } => {
                for (day, text) in desk.calendar_month(date.year(), date.month())? {
                    println!("{day}\t{text}");
                }
            }
        },
        Command::SetKey { key } => {
            if desk.set_api_key(&key)? {
                println!("api key saved");
            } else {
                println!("api key cleared");
            }
        }
        Command::Ask {
            subject,
            name,
            question,
            wait_secs,
        } => {
            desk.open_note(&subject, &name)?;
            let handle = desk.submit_query(&question)?;
            return Ok(wait_for(&mut desk, &handle, wait_secs).exit_code());
        }
        Command::Generate {
            subject,
            name,
            wait_secs,
        } => {
            let handle = desk.submit_generation(&subject, &name)?;
            return Ok(wait_for(&mut desk, &handle, wait_secs).exit_code());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// How a waited-on background task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Delivered,
    Failed,
    TimedOut,
}

impl TaskOutcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Self::Delivered => ExitCode::SUCCESS,
            Self::Failed | Self::TimedOut => ExitCode::FAILURE,
        }
    }
}

fn wait_for<F: NoteFiles>(
    desk: &mut StudyDesk<F>,
    handle: &TaskHandle,
    wait_secs: u64,
) -> TaskOutcome {
    match desk.wait_event(Duration::from_secs(wait_secs)) {
        Some(DeskEvent::QueryAnswered { answer, .. }) => {
            println!("{answer}");
            TaskOutcome::Delivered
        }
        Some(DeskEvent::ExerciseReady { entry, .. }) => {
            print_entry(&entry);
            TaskOutcome::Delivered
        }
        Some(DeskEvent::TaskFailed { message, .. }) => {
            eprintln!("task failed: {message}");
            TaskOutcome::Failed
        }
        None => {
            handle.cancel();
            eprintln!("no result after {wait_secs}s");
            TaskOutcome::TimedOut
        }
    }
}

fn print_entry(entry: &NoteEntry) {
    println!(
        "{}\t{}\t{}\t{}",
        entry.subject,
        entry.name,
        entry.kind.as_str(),
        entry.path.display()
    );
}
