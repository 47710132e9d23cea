//! Backend abstraction.
//!
//! Provides the vocabulary shared by every generative-model backend: which
//! kinds exist, how one is configured, what a request looks like and the
//! [`Transport`] interface that turns a request into raw model output.

use crate::error::GenerationError;
use crate::schema::SchemaDescriptor;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Default model for natively schema-constrained backends.
pub const DEFAULT_NATIVE_MODEL: &str = "gemini-2.5-flash";

/// The closed set of supported backend kinds.
///
/// Declaration order is the order in which failover candidates are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    /// Accepts a schema object directly and guarantees conforming output.
    NativeStructured,
    /// Chat-completions HTTP API with a JSON-object response mode.
    ChatCompletionsJson,
    /// Local inference server with a `format=json` hint.
    LocalGenerateJson,
    /// Model-scoped edge inference endpoint.
    EdgeInferenceJson,
}

impl BackendKind {
    /// All kinds, in failover order.
    pub const ALL: [BackendKind; 4] = [
        Self::NativeStructured,
        Self::ChatCompletionsJson,
        Self::LocalGenerateJson,
        Self::EdgeInferenceJson,
    ];

    /// Returns the persisted name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NativeStructured => "nativeStructured",
            Self::ChatCompletionsJson => "chatCompletionsJson",
            Self::LocalGenerateJson => "localGenerateJson",
            Self::EdgeInferenceJson => "edgeInferenceJson",
        }
    }

    /// Whether calls need an explicit endpoint.
    #[must_use]
    pub fn requires_endpoint(self) -> bool {
        !matches!(self, Self::NativeStructured)
    }

    /// Whether calls need a credential.
    #[must_use]
    pub fn requires_credential(self) -> bool {
        !matches!(self, Self::LocalGenerateJson)
    }

    /// The model used when none is selected, if this kind has one.
    #[must_use]
    pub fn default_model(self) -> Option<&'static str> {
        match self {
            Self::NativeStructured => Some(DEFAULT_NATIVE_MODEL),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown backend '{s}', expected one of: {}", known.join(", "))
            })
    }
}

/// Configuration for one backend.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendConfig {
    /// Base URL for the API.
    pub endpoint: String,
    /// API key, passed through untouched.
    pub credential: String,
    /// Selected model identifier.
    pub model: String,
    /// Models known to be offered by this backend.
    pub available_models: Vec<String>,
}

impl BackendConfig {
    /// Creates a configuration with the given endpoint, credential and model.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential: credential.into(),
            model: model.into(),
            available_models: Vec::new(),
        }
    }

    /// Sets the list of available models.
    #[must_use]
    pub fn with_available_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    /// Checks that every field `kind` needs is present.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Configuration`] naming the first missing field.
    pub fn validate(&self, kind: BackendKind) -> Result<(), GenerationError> {
        if kind.requires_endpoint() && self.endpoint.trim().is_empty() {
            return Err(GenerationError::configuration(kind, "endpoint is required"));
        }
        if kind.requires_credential() && self.credential.trim().is_empty() {
            return Err(GenerationError::configuration(kind, "credential is required"));
        }
        self.resolved_model(kind)?;
        Ok(())
    }

    /// Returns true if `kind` could be called with this configuration.
    #[must_use]
    pub fn is_viable(&self, kind: BackendKind) -> bool {
        self.validate(kind).is_ok()
    }

    /// Returns the selected model, or the kind's default.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Configuration`] when no model is selected
    /// and the kind has no default.
    pub fn resolved_model(&self, kind: BackendKind) -> Result<&str, GenerationError> {
        let model = self.model.trim();
        if !model.is_empty() {
            return Ok(model);
        }
        kind.default_model()
            .ok_or_else(|| GenerationError::configuration(kind, "no model selected"))
    }

    /// Joins `path` onto the endpoint with exactly one slash between them.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.endpoint, path)
    }
}

/// Joins a base URL and a path with exactly one slash between them.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credential = if self.credential.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("BackendConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &credential)
            .field("model", &self.model)
            .field("available_models", &self.available_models)
            .finish()
    }
}

/// An abstract generation request: a prompt plus the required output shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    schema: SchemaDescriptor,
    temperature: Option<f64>,
    strict: bool,
}

impl GenerationRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(prompt: impl Into<String>, schema: SchemaDescriptor) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
            temperature: None,
            strict: false,
        }
    }

    /// Sets the sampling temperature forwarded to backends.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Requires parsed output to pass [`SchemaDescriptor::check`].
    ///
    /// A value that fails the check is treated like unparsable output.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// The natural-language prompt.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The required output shape.
    #[must_use]
    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// The sampling temperature, if set.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Whether strict shape validation is requested.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The prompt with the JSON-only instruction appended, for backends
    /// that cannot be constrained by a schema object.
    #[must_use]
    pub fn prompt_with_instruction(&self) -> String {
        format!("{}\n\n{}", self.prompt.trim_end(), self.schema.instruction())
    }
}

/// Raw text returned by a backend, before extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    /// The generated text.
    pub text: String,
}

impl RawOutput {
    /// Wraps backend text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A parsed generation result.
///
/// Carries only the value; which backend produced it is not part of the
/// result.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    value: JsonValue,
}

impl GenerationResult {
    /// Wraps a parsed value.
    #[must_use]
    pub fn new(value: JsonValue) -> Self {
        Self { value }
    }

    /// Borrows the parsed value.
    #[must_use]
    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    /// Takes ownership of the parsed value.
    #[must_use]
    pub fn into_value(self) -> JsonValue {
        self.value
    }

    /// Deserializes the value into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the value does not fit `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value)
    }
}

/// Executes one request against one configured backend.
///
/// Implementations perform network I/O only and never mutate local state.
#[async_trait]
pub trait TransportExecutor: Send + Sync {
    /// Sends the request and returns the backend's raw text.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Configuration`] without any network call
    /// when a required field is missing, and [`GenerationError::Transport`]
    /// when the call itself fails.
    async fn execute(
        &self,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<RawOutput, GenerationError>;

    /// The kind this executor speaks.
    fn kind(&self) -> BackendKind;
}

/// Dispatches a request to the executor for a given backend kind.
///
/// This is the seam the orchestrator is written against; tests substitute
/// scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes `request` against the backend of kind `kind`.
    ///
    /// # Errors
    ///
    /// Same as [`TransportExecutor::execute`].
    async fn execute(
        &self,
        kind: BackendKind,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<RawOutput, GenerationError>;
}
