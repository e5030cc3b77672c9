//! Generative model collaborator and the prompts built on it.
//!
//! # Responsibility
//! - Define the model contract (`LanguageModel`) and its HTTP implementation.
//! - Bound every prompt before it leaves the process.
//! - Treat model output as untrusted text that needs cleanup.
//!
//! # Invariants
//! - Query context is capped at `QUERY_CONTEXT_CHAR_LIMIT` characters.
//! - Exercise source text is capped at `EXERCISE_SOURCE_CHAR_LIMIT` characters.
//! - Calls without an API key fail before any network access.

pub mod client;
pub mod exercise;
pub mod query;

pub use client::{GeminiClient, LanguageModel, ModelError, ModelResult};
pub use exercise::{GeneratedExercise, EXERCISE_SOURCE_CHAR_LIMIT};
pub use query::QUERY_CONTEXT_CHAR_LIMIT;
