//! Model contract and the `generateContent` REST client.

use crate::config::ModelConfig;
use crate::logging::sanitize_message;
use log::{error, info};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MAX_ERROR_BODY_CHARS: usize = 300;

pub type ModelResult<T> = Result<T, ModelError>;

/// Failure of an external model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    MissingApiKey,
    Timeout,
    Transport(String),
    Status { code: u16, body: String },
    Malformed(String),
    EmptyResponse,
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "no API key configured"),
            Self::Timeout => write!(f, "model request timed out"),
            Self::Transport(message) => write!(f, "model request failed: {message}"),
            Self::Status { code, body } => write!(f, "model API returned {code}: {body}"),
            Self::Malformed(message) => write!(f, "malformed model response: {message}"),
            Self::EmptyResponse => write!(f, "model response did not include readable text"),
        }
    }
}

impl Error for ModelError {}

impl From<reqwest::Error> for ModelError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(sanitize_message(&value.to_string(), MAX_ERROR_BODY_CHARS))
        }
    }
}

impl ModelError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_api_key",
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "http_status",
            Self::Malformed(_) => "malformed",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// Text generation collaborator.
///
/// Implementations block the calling thread; callers run them on a worker.
pub trait LanguageModel: Send + Sync {
    fn generate(&self, api_key: &str, prompt: &str) -> ModelResult<String>;
}

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig) -> ModelResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl LanguageModel for GeminiClient {
    fn generate(&self, api_key: &str, prompt: &str) -> ModelResult<String> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ModelError::MissingApiKey);
        }

        let started_at = Instant::now();
        info!(
            "event=model_call module=ai status=start model={} prompt_chars={}",
            self.model,
            prompt.chars().count()
        );

        let result = self.send(api_key, prompt);
        match &result {
            Ok(text) => info!(
                "event=model_call module=ai status=ok duration_ms={} output_chars={}",
                started_at.elapsed().as_millis(),
                text.chars().count()
            ),
            Err(err) => error!(
                "event=model_call module=ai status=error duration_ms={} error_code={}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }
}

impl GeminiClient {
    fn send(&self, api_key: &str, prompt: &str) -> ModelResult<String> {
        let payload = json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ]
        });

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ModelError::Status {
                code: status.as_u16(),
                body: sanitize_message(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|err| ModelError::Malformed(err.to_string()))?;
        extract_candidate_text(&value)
    }
}

/// Concatenated text parts of the first candidate.
pub fn extract_candidate_text(value: &Value) -> ModelResult<String> {
    let candidate = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first());

    let Some(candidate) = candidate else {
        if let Some(reason) = value
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            return Err(ModelError::Malformed(format!("prompt blocked: {reason}")));
        }
        return Err(ModelError::EmptyResponse);
    };

    let text = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(text)
}
