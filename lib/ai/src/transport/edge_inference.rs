//! Model-scoped edge inference endpoint (`{endpoint}/{model}`).

use super::{JSON_SYSTEM_PROMPT, send_json, text_at};
use crate::backend::{BackendConfig, BackendKind, GenerationRequest, RawOutput, TransportExecutor};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument};

const KIND: BackendKind = BackendKind::EdgeInferenceJson;

/// Executor for edge inference services that route by model in the URL,
/// such as `https://api.cloudflare.com/client/v4/accounts/{id}/ai/run`.
#[derive(Debug, Clone)]
pub struct EdgeInferenceExecutor {
    client: reqwest::Client,
}

impl EdgeInferenceExecutor {
    /// Creates an executor using `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub(crate) fn build_body(request: &GenerationRequest) -> JsonValue {
        let mut body = json!({
            "messages": [
                { "role": "system", "content": JSON_SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt_with_instruction() },
            ],
        });
        if let Some(temperature) = request.temperature() {
            body["temperature"] = json!(temperature);
        }
        body
    }

    /// Edge envelopes report failures in-band with `success: false`.
    pub(crate) fn read_text(envelope: &JsonValue) -> Result<String, GenerationError> {
        if envelope.get("success").and_then(JsonValue::as_bool) == Some(false) {
            let message = super::error_message(envelope)
                .unwrap_or_else(|| "inference reported failure".to_string());
            return Err(GenerationError::transport(KIND, message));
        }
        text_at(KIND, envelope, "/result/response")
    }
}

#[async_trait]
impl TransportExecutor for EdgeInferenceExecutor {
    #[instrument(skip_all, fields(backend = %KIND))]
    async fn execute(
        &self,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<RawOutput, GenerationError> {
        config.validate(KIND)?;
        let model = config.resolved_model(KIND)?;
        let url = config.url(model);
        debug!(%url, model, "sending edge inference request");

        let envelope = send_json(
            KIND,
            self.client
                .post(&url)
                .bearer_auth(config.credential.trim())
                .json(&Self::build_body(request)),
        )
        .await?;

        Self::read_text(&envelope).map(RawOutput::new)
    }

    fn kind(&self) -> BackendKind {
        KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDescriptor;
    use crate::transport::stub_server::{client, serve_once};

    #[test]
    fn model_is_scoped_in_the_url() {
        let config = BackendConfig::new(
            "https://api.cloudflare.com/client/v4/accounts/abc/ai/run/",
            "token",
            "@cf/meta/llama-3-8b-instruct",
        );
        assert_eq!(
            config.url(&config.model),
            "https://api.cloudflare.com/client/v4/accounts/abc/ai/run/@cf/meta/llama-3-8b-instruct"
        );
    }

    #[test]
    fn body_uses_chat_messages_with_instruction() {
        let request = GenerationRequest::new("Explain", SchemaDescriptor::array(SchemaDescriptor::string()));
        let body = EdgeInferenceExecutor::build_body(&request);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(
            body["messages"][1]["content"]
                .as_str()
                .expect("content")
                .contains("Respond with JSON only")
        );
        assert!(body.get("model").is_none());
    }

    #[test]
    fn reads_result_response() {
        let envelope = json!({"success": true, "result": {"response": "{\"a\":1}"}});
        assert_eq!(
            EdgeInferenceExecutor::read_text(&envelope),
            Ok("{\"a\":1}".to_string())
        );
    }

    #[test]
    fn in_band_failure_is_transient() {
        let envelope = json!({"success": false, "errors": [{"message": "capacity exceeded"}]});
        let err = EdgeInferenceExecutor::read_text(&envelope).unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("capacity exceeded"));
    }

    #[tokio::test]
    async fn posts_to_model_scoped_url_with_bearer_token() {
        let (base, captured) =
            serve_once(200, r#"{"success": true, "result": {"response": "[1, 2]"}}"#).await;
        let executor = EdgeInferenceExecutor::new(client());
        let config = BackendConfig::new(format!("{base}/ai/run"), "edge-token", "@cf/x");
        let request = GenerationRequest::new("Count", SchemaDescriptor::array(SchemaDescriptor::integer()));

        let output = executor.execute(&config, &request).await.expect("output");
        let captured = captured.await.expect("request");

        assert_eq!(output.text, "[1, 2]");
        assert_eq!(captured.request_line, "POST /ai/run/@cf/x HTTP/1.1");
        assert_eq!(captured.header("authorization"), Some("Bearer edge-token"));
        assert!(captured.body.get("model").is_none());
    }

    #[tokio::test]
    async fn rate_limit_is_a_transient_transport_error() {
        let (base, _captured) =
            serve_once(429, r#"{"success": false, "errors": [{"message": "slow down"}]}"#).await;
        let executor = EdgeInferenceExecutor::new(client());
        let config = BackendConfig::new(base, "edge-token", "@cf/x");
        let request = GenerationRequest::new("x", SchemaDescriptor::string());

        let err = executor.execute(&config, &request).await.unwrap_err();
        assert_eq!(err, GenerationError::http_status(KIND, 429, "slow down"));
        assert!(err.is_transient());
    }
}
