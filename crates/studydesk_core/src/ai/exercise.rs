//! Exercise sheet generation from note text.
//!
//! Only the first `EXERCISE_SOURCE_CHAR_LIMIT` characters of a note reach the
//! model, so sheets for long notes cover the opening part only.

use super::client::{LanguageModel, ModelError, ModelResult};
use crate::model::note::EXERCISE_PREFIX;
use crate::text::truncate_chars;
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters of note text embedded in the generation prompt.
pub const EXERCISE_SOURCE_CHAR_LIMIT: usize = 7_000;

/// Extension dropped from the title before naming the sheet.
const HTML_EXTENSION: &str = ".html";

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```(?:html)?").expect("valid fence regex"));

/// A generated sheet ready to be registered in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedExercise {
    /// Entry and file name, e.g. `GENERATED_Derivatives.html`.
    pub name: String,
    pub html: String,
}

pub fn build_exercise_prompt(source_text: &str) -> String {
    format!(
        "You are a strict teacher. Generate an HTML5 exercise sheet based on the text below.\n\
         RULES:\n\
         1. Do NOT summarize the text. Do not produce notes.\n\
         2. Create EXACTLY 3 distinct, practical problems (Task 1, Task 2, Task 3).\n\
         3. For each task, put the correct solution inside a <details> element.\n\
         4. The <summary> element must read: 'Click to reveal the solution'.\n\
         5. Use HTML tags only. No markdown and no code fences.\n\
         6. Use light text colors (white or light gray); the page background is dark.\n\n\
         SOURCE TEXT: {}",
        truncate_chars(source_text, EXERCISE_SOURCE_CHAR_LIMIT)
    )
}

/// Removes markdown code fence markers and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    FENCE_RE.replace_all(raw, "").trim().to_string()
}

/// Sheet name for a note titled `title_hint`.
pub fn exercise_name(title_hint: &str) -> String {
    let trimmed = title_hint.trim();
    let title = trimmed
        .strip_suffix(HTML_EXTENSION)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(trimmed);
    format!("{EXERCISE_PREFIX}{title}.html").replace(' ', "_")
}

/// Generates an exercise sheet from `source_text`.
///
/// # Errors
/// - `MissingApiKey` before any call when `api_key` is blank.
/// - Any model failure, or `EmptyResponse` when nothing is left after cleanup.
pub fn generate(
    model: &dyn LanguageModel,
    api_key: &str,
    source_text: &str,
    title_hint: &str,
) -> ModelResult<GeneratedExercise> {
    if api_key.trim().is_empty() {
        return Err(ModelError::MissingApiKey);
    }

    let raw = model.generate(api_key, &build_exercise_prompt(source_text))?;
    let html = strip_code_fences(&raw);
    if html.is_empty() {
        return Err(ModelError::EmptyResponse);
    }

    Ok(GeneratedExercise {
        name: exercise_name(title_hint),
        html,
    })
}
