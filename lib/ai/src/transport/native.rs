//! Natively schema-constrained backend (`generateContent`).

use super::{ERROR_BODY_CHARS, send_json, text_at};
use crate::backend::{
    BackendConfig, BackendKind, GenerationRequest, RawOutput, TransportExecutor, join_url,
};
use crate::error::GenerationError;
use async_trait::async_trait;
use quizsmith_core::excerpt;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument};

/// Public API base used when no endpoint is configured.
pub const DEFAULT_NATIVE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

const KIND: BackendKind = BackendKind::NativeStructured;

/// Executor for backends that accept a response schema directly.
#[derive(Debug, Clone)]
pub struct NativeStructuredExecutor {
    client: reqwest::Client,
}

impl NativeStructuredExecutor {
    /// Creates an executor using `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns the configured endpoint or the public API base.
    pub(crate) fn base_url(config: &BackendConfig) -> &str {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            DEFAULT_NATIVE_ENDPOINT
        } else {
            endpoint
        }
    }

    pub(crate) fn build_body(request: &GenerationRequest) -> JsonValue {
        let mut generation_config = json!({
            "responseMimeType": "application/json",
            "responseSchema": request.schema().to_openapi_schema(),
        });
        if let Some(temperature) = request.temperature() {
            generation_config["temperature"] = json!(temperature);
        }
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt() }],
            }],
            "generationConfig": generation_config,
        })
    }

    /// Concatenates the text parts of the first candidate.
    pub(crate) fn read_text(envelope: &JsonValue) -> Result<String, GenerationError> {
        let Some(parts) = envelope
            .pointer("/candidates/0/content/parts")
            .and_then(JsonValue::as_array)
        else {
            if let Some(reason) = envelope
                .pointer("/promptFeedback/blockReason")
                .and_then(JsonValue::as_str)
            {
                return Err(GenerationError::parse(
                    format!("prompt was blocked: {reason}"),
                    excerpt(&envelope.to_string(), ERROR_BODY_CHARS),
                ));
            }
            return text_at(KIND, envelope, "/candidates/0/content/parts/0/text");
        };

        Ok(parts
            .iter()
            .filter_map(|part| part.get("text").and_then(JsonValue::as_str))
            .collect())
    }
}

#[async_trait]
impl TransportExecutor for NativeStructuredExecutor {
    #[instrument(skip_all, fields(backend = %KIND))]
    async fn execute(
        &self,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<RawOutput, GenerationError> {
        config.validate(KIND)?;
        let model = config.resolved_model(KIND)?;
        let url = join_url(
            Self::base_url(config),
            &format!("models/{model}:generateContent"),
        );
        debug!(%url, model, "sending native structured request");

        let envelope = send_json(
            KIND,
            self.client
                .post(&url)
                .header("x-goog-api-key", config.credential.trim())
                .json(&Self::build_body(request)),
        )
        .await?;

        Self::read_text(&envelope).map(RawOutput::new)
    }

    fn kind(&self) -> BackendKind {
        KIND
    }
}
