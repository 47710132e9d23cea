//! Local inference server (`/api/generate` with `format=json`).

use super::{send_json, text_at};
use crate::backend::{BackendConfig, BackendKind, GenerationRequest, RawOutput, TransportExecutor};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument};

const KIND: BackendKind = BackendKind::LocalGenerateJson;

/// Executor for a local generate endpoint. Sends no authentication.
#[derive(Debug, Clone)]
pub struct LocalGenerateExecutor {
    client: reqwest::Client,
}

impl LocalGenerateExecutor {
    /// Creates an executor using `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub(crate) fn build_body(model: &str, request: &GenerationRequest) -> JsonValue {
        let mut body = json!({
            "model": model,
            "prompt": request.prompt_with_instruction(),
            "format": "json",
            "stream": false,
        });
        if let Some(temperature) = request.temperature() {
            body["options"] = json!({ "temperature": temperature });
        }
        body
    }
}

#[async_trait]
impl TransportExecutor for LocalGenerateExecutor {
    #[instrument(skip_all, fields(backend = %KIND))]
    async fn execute(
        &self,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<RawOutput, GenerationError> {
        config.validate(KIND)?;
        let model = config.resolved_model(KIND)?;
        let url = config.url("api/generate");
        debug!(%url, model, "sending local generate request");

        let envelope = send_json(
            KIND,
            self.client.post(&url).json(&Self::build_body(model, request)),
        )
        .await?;

        text_at(KIND, &envelope, "/response").map(RawOutput::new)
    }

    fn kind(&self) -> BackendKind {
        KIND
    }
}
