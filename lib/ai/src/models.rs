//! Model discovery for each backend kind.

use crate::backend::{BackendConfig, BackendKind};
use crate::error::GenerationError;
use crate::settings::OrchestratorSettings;
use crate::transport::{DEFAULT_NATIVE_ENDPOINT, send_json};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument};

/// Models offered by edge inference services without a listing endpoint.
pub const EDGE_MODELS: [&str; 3] = [
    "@cf/meta/llama-3-8b-instruct",
    "@cf/mistral/mistral-7b-instruct-v0.1",
    "@cf/google/gemma-7b-it",
];

/// Lists the models a backend offers.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    client: reqwest::Client,
}

impl ModelCatalog {
    /// Creates a new catalog that lists models through `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Creates a catalog whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client))
    }

    /// Fetches the model names `kind` reports for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Configuration`] when the endpoint or
    /// credential needed for listing is missing, and transport or parse
    /// errors when the listing call fails.
    #[instrument(skip(self, config))]
    pub async fn list_models(
        &self,
        kind: BackendKind,
        config: &BackendConfig,
    ) -> Result<Vec<String>, GenerationError> {
        let models = match kind {
            BackendKind::EdgeInferenceJson => {
                EDGE_MODELS.iter().map(ToString::to_string).collect()
            }
            BackendKind::LocalGenerateJson => {
                require_endpoint(kind, config)?;
                let body = send_json(kind, self.client.get(config.url("api/tags"))).await?;
                parse_tag_listing(&body)
            }
            BackendKind::ChatCompletionsJson => {
                require_endpoint(kind, config)?;
                let mut builder = self.client.get(config.url("models"));
                if !config.credential.trim().is_empty() {
                    builder = builder.bearer_auth(config.credential.trim());
                }
                let body = send_json(kind, builder).await?;
                parse_model_listing(&body)
            }
            BackendKind::NativeStructured => {
                if config.credential.trim().is_empty() {
                    return Err(GenerationError::configuration(kind, "missing credential"));
                }
                let base = if config.endpoint.trim().is_empty() {
                    DEFAULT_NATIVE_ENDPOINT
                } else {
                    config.endpoint.trim()
                };
                let url = crate::backend::join_url(base, "models");
                let body = send_json(
                    kind,
                    self.client
                        .get(url)
                        .header("x-goog-api-key", config.credential.trim()),
                )
                .await?;
                parse_native_listing(&body)
            }
        };
        debug!(count = models.len(), "listed models");
        Ok(models)
    }

    /// Refreshes the available models of `kind` in `settings`.
    ///
    /// Leaves `settings` untouched on error or when the listing is empty.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`list_models`](Self::list_models).
    pub async fn refresh_available_models(
        &self,
        settings: &mut OrchestratorSettings,
        kind: BackendKind,
    ) -> Result<Vec<String>, GenerationError> {
        let config = settings.backend(kind).cloned().unwrap_or_default();
        let models = self.list_models(kind, &config).await?;
        if models.is_empty() {
            return Ok(models);
        }
        if settings.backend(kind).is_none() {
            settings.update_backend(kind, config);
        }
        settings
            .set_available_models(kind, models.clone())
            .map_err(|e| GenerationError::configuration(kind, e.to_string()))?;
        Ok(models)
    }
}

fn require_endpoint(kind: BackendKind, config: &BackendConfig) -> Result<(), GenerationError> {
    if config.endpoint.trim().is_empty() {
        return Err(GenerationError::configuration(kind, "missing endpoint"));
    }
    Ok(())
}

/// `{"models": [{"name": "llama3:latest"}, ...]}`
fn parse_tag_listing(body: &JsonValue) -> Vec<String> {
    body.get("models")
        .and_then(JsonValue::as_array)
        .map(|models| names(models, &["name"]))
        .unwrap_or_default()
}

/// `{"data": [{"id": ...}]}` or a bare array of `id`/`name` objects.
fn parse_model_listing(body: &JsonValue) -> Vec<String> {
    if let Some(data) = body.get("data").and_then(JsonValue::as_array) {
        return names(data, &["id"]);
    }
    body.as_array()
        .map(|items| names(items, &["id", "name"]))
        .unwrap_or_default()
}

/// `{"models": [{"name": "models/gemini-2.5-flash", ...}]}`
fn parse_native_listing(body: &JsonValue) -> Vec<String> {
    parse_tag_listing(body)
        .into_iter()
        .map(|name| name.strip_prefix("models/").map(str::to_string).unwrap_or(name))
        .collect()
}

fn names(items: &[JsonValue], keys: &[&str]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| {
            keys.iter()
                .find_map(|key| item.get(*key).and_then(JsonValue::as_str))
        })
        .map(str::to_string)
        .collect()
}
