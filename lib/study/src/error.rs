//! Error types for study content generation.
//!
//! [`StudyError::Generation`] carries the orchestrator's error unchanged,
//! so callers can still tell a misconfigured backend from an exhausted
//! failover.

use quizsmith_ai::GenerationError;
use std::fmt;

/// Errors from generating study content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudyError {
    /// The orchestrator could not produce a result.
    Generation(GenerationError),
    /// The result did not decode into the expected content.
    Decode { content: &'static str, reason: String },
    /// The result decoded but held no items.
    EmptyContent { content: &'static str },
    /// A prompt template is missing or lacks required variables.
    Prompt { template: String, reason: String },
}

impl StudyError {
    pub(crate) fn missing_variables(template: &str, missing: &[String]) -> Self {
        Self::Prompt {
            template: template.to_string(),
            reason: format!("missing variables: {}", missing.join(", ")),
        }
    }

    pub(crate) fn unknown_template(template: &str) -> Self {
        Self::Prompt {
            template: template.to_string(),
            reason: "template not registered".to_string(),
        }
    }
}

impl fmt::Display for StudyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation(err) => write!(f, "generation failed: {err}"),
            Self::Decode { content, reason } => write!(f, "invalid {content}: {reason}"),
            Self::EmptyContent { content } => write!(f, "no {content} were generated"),
            Self::Prompt { template, reason } => write!(f, "prompt '{template}': {reason}"),
        }
    }
}

impl std::error::Error for StudyError {}

impl From<GenerationError> for StudyError {
    fn from(err: GenerationError) -> Self {
        Self::Generation(err)
    }
}
