//! CLI error types.

use quizsmith_ai::{GenerationError, SettingsError};
use quizsmith_study::StudyError;
use std::fmt;

/// Errors surfaced by a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// Environment configuration is invalid.
    Config(String),
    /// The HTTP client could not be built.
    Http(String),
    Settings(SettingsError),
    Generation(GenerationError),
    Study(StudyError),
    /// Output could not be written.
    Output(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(reason) => write!(f, "invalid configuration: {reason}"),
            Self::Http(reason) => write!(f, "failed to build HTTP client: {reason}"),
            Self::Settings(err) => err.fmt(f),
            Self::Generation(err) => err.fmt(f),
            Self::Study(err) => err.fmt(f),
            Self::Output(reason) => write!(f, "failed to write output: {reason}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

impl From<GenerationError> for CliError {
    fn from(err: GenerationError) -> Self {
        Self::Generation(err)
    }
}

impl From<StudyError> for CliError {
    fn from(err: StudyError) -> Self {
        Self::Study(err)
    }
}
