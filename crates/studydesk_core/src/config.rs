//! Runtime configuration for the desk core.
//!
//! # Responsibility
//! - Resolve the data file, managed notes directory and log directory.
//! - Carry model call settings and the corrupt-index recovery policy.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - Unparseable values fall back to defaults; they never abort startup.

use crate::index::RecoveryPolicy;
use log::warn;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DATA_FILE_NAME: &str = "study_data.json";
pub const NOTES_DIR_NAME: &str = "notes_library";
pub const LOG_DIR_NAME: &str = "logs";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_MODEL_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 50;
pub const DEFAULT_GENERATED_SUBJECT: &str = "Other";

const ENV_HOME: &str = "STUDYDESK_HOME";
const ENV_DATA_FILE: &str = "STUDYDESK_DATA_FILE";
const ENV_NOTES_DIR: &str = "STUDYDESK_NOTES_DIR";
const ENV_LOG_DIR: &str = "STUDYDESK_LOG_DIR";
const ENV_LOG_LEVEL: &str = "STUDYDESK_LOG_LEVEL";
const ENV_RECOVERY: &str = "STUDYDESK_RECOVERY";
const ENV_MODEL: &str = "STUDYDESK_MODEL";
const ENV_MODEL_ENDPOINT: &str = "STUDYDESK_MODEL_ENDPOINT";
const ENV_MODEL_TIMEOUT_SECS: &str = "STUDYDESK_MODEL_TIMEOUT_SECS";

/// Settings for the generative model collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Base URL of the `generateContent` REST API.
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS),
        }
    }
}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_file: PathBuf,
    pub notes_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub recovery: RecoveryPolicy,
    pub model: ModelConfig,
    /// Subject that receives generated exercise sheets.
    pub generated_subject: String,
}

impl AppConfig {
    /// Default layout rooted at `home`.
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        Self {
            data_file: home.join(DATA_FILE_NAME),
            notes_dir: home.join(NOTES_DIR_NAME),
            log_dir: home.join(LOG_DIR_NAME),
            log_level: crate::logging::default_log_level().to_string(),
            recovery: RecoveryPolicy::default(),
            model: ModelConfig::default(),
            generated_subject: DEFAULT_GENERATED_SUBJECT.to_string(),
        }
    }

    /// Resolves configuration from `STUDYDESK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let home = value(ENV_HOME)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::with_home(home);

        if let Some(path) = value(ENV_DATA_FILE) {
            config.data_file = PathBuf::from(path);
        }
        if let Some(path) = value(ENV_NOTES_DIR) {
            config.notes_dir = PathBuf::from(path);
        }
        if let Some(path) = value(ENV_LOG_DIR) {
            config.log_dir = PathBuf::from(path);
        }
        if let Some(level) = value(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(raw) = value(ENV_RECOVERY) {
            match RecoveryPolicy::parse(&raw) {
                Some(policy) => config.recovery = policy,
                None => warn!(
                    "event=config_load module=config status=fallback key={} reason=unknown_policy",
                    ENV_RECOVERY
                ),
            }
        }
        if let Some(model) = value(ENV_MODEL) {
            config.model.model = model;
        }
        if let Some(endpoint) = value(ENV_MODEL_ENDPOINT) {
            config.model.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(raw) = value(ENV_MODEL_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.model.timeout = Duration::from_secs(secs),
                _ => warn!(
                    "event=config_load module=config status=fallback key={} reason=invalid_number",
                    ENV_MODEL_TIMEOUT_SECS
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, DATA_FILE_NAME, DEFAULT_MODEL, NOTES_DIR_NAME};
    use crate::index::RecoveryPolicy;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn home_drives_default_layout() {
        let config = AppConfig::from_lookup(lookup(&[("STUDYDESK_HOME", "/srv/desk")]));
        assert_eq!(config.data_file, PathBuf::from("/srv/desk").join(DATA_FILE_NAME));
        assert_eq!(config.notes_dir, PathBuf::from("/srv/desk").join(NOTES_DIR_NAME));
        assert_eq!(config.model.model, DEFAULT_MODEL);
        assert_eq!(config.recovery, RecoveryPolicy::Fail);
    }

    #[test]
    fn overrides_apply_and_blank_values_are_ignored() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STUDYDESK_HOME", "/srv/desk"),
            ("STUDYDESK_NOTES_DIR", "  "),
            ("STUDYDESK_DATA_FILE", "/data/index.json"),
            ("STUDYDESK_RECOVERY", "Quarantine"),
            ("STUDYDESK_MODEL_TIMEOUT_SECS", "5"),
            ("STUDYDESK_MODEL_ENDPOINT", "http://127.0.0.1:9/v1/"),
        ]));
        assert_eq!(config.data_file, PathBuf::from("/data/index.json"));
        assert_eq!(config.notes_dir, PathBuf::from("/srv/desk").join(NOTES_DIR_NAME));
        assert_eq!(config.recovery, RecoveryPolicy::Quarantine);
        assert_eq!(config.model.timeout, Duration::from_secs(5));
        assert_eq!(config.model.endpoint, "http://127.0.0.1:9/v1");
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("STUDYDESK_HOME", "/srv/desk"),
            ("STUDYDESK_RECOVERY", "shrug"),
            ("STUDYDESK_MODEL_TIMEOUT_SECS", "soon"),
        ]));
        assert_eq!(config.recovery, RecoveryPolicy::Fail);
        assert_eq!(config.model.timeout, Duration::from_secs(50));
    }
}
