//! Free-form questions about the note currently open.

use super::client::{LanguageModel, ModelError, ModelResult};
use crate::text::truncate_chars;

/// Characters of note text sent along with a question.
pub const QUERY_CONTEXT_CHAR_LIMIT: usize = 10_000;

pub fn build_query_prompt(context: &str, question: &str) -> String {
    format!(
        "CTX:{} TASK:{}",
        truncate_chars(context, QUERY_CONTEXT_CHAR_LIMIT),
        question.trim()
    )
}

/// Asks `question` about `context` and returns the model's answer.
pub fn ask(
    model: &dyn LanguageModel,
    api_key: &str,
    context: &str,
    question: &str,
) -> ModelResult<String> {
    if api_key.trim().is_empty() {
        return Err(ModelError::MissingApiKey);
    }
    let answer = model.generate(api_key, &build_query_prompt(context, question))?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::{build_query_prompt, QUERY_CONTEXT_CHAR_LIMIT};

    #[test]
    fn context_is_capped() {
        let context = "x".repeat(QUERY_CONTEXT_CHAR_LIMIT + 50);
        let prompt = build_query_prompt(&context, " What is a limit? ");
        assert!(prompt.starts_with("CTX:"));
        assert!(prompt.ends_with(" TASK:What is a limit?"));
        assert_eq!(prompt.matches('x').count(), QUERY_CONTEXT_CHAR_LIMIT);
    }
}
