//! Error types for the AI crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `GenerationError`: everything a generation attempt can fail with, from
//!   a single backend call up to failover exhaustion
//! - `SettingsError`: backend registry edits and settings persistence
//!
//! Public entry points wrap these in `rootcause::Report`; callers read the
//! typed error back with `Report::current_context()`.

use crate::backend::BackendKind;
use std::fmt;

/// Errors from generating structured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The backend is missing a required configuration field.
    ///
    /// Never retried; the backend is skipped as a failover candidate.
    Configuration { backend: BackendKind, reason: String },
    /// The backend could not be reached or answered with a failure.
    ///
    /// Retried locally, then triggers failover.
    Transport {
        backend: BackendKind,
        status: Option<u16>,
        message: String,
    },
    /// The backend answered but its output could not be turned into the
    /// requested structure. Not retried; failover still proceeds.
    Parse { reason: String, excerpt: String },
    /// Every viable backend failed.
    Exhausted { failures: Vec<BackendFailure> },
}

impl GenerationError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(backend: BackendKind, reason: impl Into<String>) -> Self {
        Self::Configuration {
            backend,
            reason: reason.into(),
        }
    }

    /// Creates a transport error without an HTTP status.
    #[must_use]
    pub fn transport(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::Transport {
            backend,
            status: None,
            message: message.into(),
        }
    }

    /// Creates a transport error for a non-success HTTP status.
    #[must_use]
    pub fn http_status(backend: BackendKind, status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            backend,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(reason: impl Into<String>, excerpt: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
            excerpt: excerpt.into(),
        }
    }

    /// Returns true if the failure is expected to be temporary and worth
    /// retrying against the same backend.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { backend, reason } => {
                write!(f, "backend '{backend}' is not configured: {reason}")
            }
            Self::Transport {
                backend,
                status: Some(status),
                message,
            } => {
                write!(f, "backend '{backend}' returned HTTP {status}: {message}")
            }
            Self::Transport {
                backend,
                status: None,
                message,
            } => {
                write!(f, "backend '{backend}' request failed: {message}")
            }
            Self::Parse { reason, excerpt } => {
                write!(f, "failed to parse backend output ({reason}): {excerpt}")
            }
            Self::Exhausted { failures } => {
                write!(f, "all providers exhausted")?;
                for failure in failures {
                    write!(f, "; {}", failure.error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for GenerationError {}

/// One backend's failure recorded while scanning for a working backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    /// The backend that failed.
    pub backend: BackendKind,
    /// Why it failed, after retries.
    pub error: GenerationError,
}

/// Errors from the backend registry and its persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The active backend has no configuration entry.
    UnknownBackend { backend: BackendKind },
    /// Reading persisted settings failed.
    LoadFailed { reason: String },
    /// Persisted settings exist but do not describe valid settings.
    Corrupt { reason: String },
    /// Writing settings failed.
    SaveFailed { reason: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBackend { backend } => {
                write!(f, "backend '{backend}' has no configuration")
            }
            Self::LoadFailed { reason } => write!(f, "failed to load settings: {reason}"),
            Self::Corrupt { reason } => write!(f, "stored settings are invalid: {reason}"),
            Self::SaveFailed { reason } => write!(f, "failed to save settings: {reason}"),
        }
    }
}

impl std::error::Error for SettingsError {}
