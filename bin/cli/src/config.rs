//! Command-line configuration.
//!
//! Loaded via the `config` crate from `QUIZSMITH_*` environment variables,
//! with nested keys separated by `__`:
//!
//! - `QUIZSMITH_SETTINGS_PATH`
//! - `QUIZSMITH_HTTP_TIMEOUT_SECONDS`
//! - `QUIZSMITH_RETRY__MAX_RETRIES`, `QUIZSMITH_RETRY__INITIAL_DELAY_MS`
//! - `QUIZSMITH_LEARNER__GRADE`, `QUIZSMITH_LEARNER__SUBJECT`
//!
//! Backend endpoints and credentials are not configured here; they live in
//! the settings file.

use quizsmith_ai::RetryPolicy;
use quizsmith_study::LearnerProfile;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "QUIZSMITH";

/// Configuration for a CLI run.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Where backend settings are persisted.
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,

    /// Per-request HTTP timeout, in seconds.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Learner used when a command does not name one.
    #[serde(default)]
    pub learner: LearnerConfig,
}

/// Retry behaviour for each backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles after each one.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearnerConfig {
    #[serde(default = "default_grade")]
    pub grade: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quizsmith")
        .join("settings.json")
}

fn default_http_timeout_seconds() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_grade() -> String {
    "Grade 6".to_string()
}

fn default_subject() -> String {
    "Natural Sciences and Technology".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            grade: default_grade(),
            subject: default_subject(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.initial_delay_ms))
    }
}

impl LearnerConfig {
    #[must_use]
    pub fn profile(&self) -> LearnerProfile {
        LearnerProfile::new(&self.grade, &self.subject)
    }
}

impl CliConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(environment())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
