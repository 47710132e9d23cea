//! Chat-completions backend with JSON response mode.

use super::{JSON_SYSTEM_PROMPT, send_json, text_at};
use crate::backend::{BackendConfig, BackendKind, GenerationRequest, RawOutput, TransportExecutor};
use crate::error::GenerationError;
use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument};

const KIND: BackendKind = BackendKind::ChatCompletionsJson;

/// Executor for OpenAI-compatible `chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct ChatCompletionsExecutor {
    client: reqwest::Client,
}

impl ChatCompletionsExecutor {
    /// Creates an executor using `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub(crate) fn build_body(model: &str, request: &GenerationRequest) -> JsonValue {
        let mut body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": JSON_SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt_with_instruction() },
            ],
        });
        // JSON-object mode forces an object at the top level, which would
        // make the model wrap array-shaped answers.
        if request.schema().is_object() {
            body["response_format"] = json!({ "type": "json_object" });
        }
        if let Some(temperature) = request.temperature() {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl TransportExecutor for ChatCompletionsExecutor {
    #[instrument(skip_all, fields(backend = %KIND))]
    async fn execute(
        &self,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<RawOutput, GenerationError> {
        config.validate(KIND)?;
        let model = config.resolved_model(KIND)?;
        let url = config.url("chat/completions");
        debug!(%url, model, "sending chat completions request");

        let envelope = send_json(
            KIND,
            self.client
                .post(&url)
                .bearer_auth(config.credential.trim())
                .json(&Self::build_body(model, request)),
        )
        .await?;

        text_at(KIND, &envelope, "/choices/0/message/content").map(RawOutput::new)
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
    fn object_schema_requests_json_object_mode() {
        let request = GenerationRequest::new(
            "Summarize",
            SchemaDescriptor::object().field("summary", SchemaDescriptor::string()),
        );
        let body = ChatCompletionsExecutor::build_body("gpt-4o-mini", &request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        let user = body["messages"][1]["content"].as_str().expect("user content");
        assert!(user.starts_with("Summarize"));
        assert!(user.contains("Respond with JSON only"));
    }

    #[test]
    fn array_schema_skips_json_object_mode() {
        let request = GenerationRequest::new("List", SchemaDescriptor::array(SchemaDescriptor::string()))
            .with_temperature(0.2);
        let body = ChatCompletionsExecutor::build_body("mistral-small", &request);
        assert!(body.get("response_format").is_none());
        assert!(body["temperature"].as_f64().is_some());
    }

    #[test]
    fn reads_first_choice() {
        let envelope = json!({
            "choices": [{"message": {"role": "assistant", "content": "```json\n[1]\n```"}}]
        });
        assert_eq!(
            text_at(KIND, &envelope, "/choices/0/message/content"),
            Ok("```json\n[1]\n```".to_string())
        );
    }

    #[tokio::test]
    async fn posts_chat_completions_with_bearer_token() {
        let reply = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"summary\": \"ok\"}"}}]}"#;
        let (base, captured) = serve_once(200, reply).await;
        let executor = ChatCompletionsExecutor::new(client());
        let config = BackendConfig::new(format!("{base}/v1/"), "sk-test", "gpt-4o-mini");
        let request = GenerationRequest::new(
            "Summarize",
            SchemaDescriptor::object().field("summary", SchemaDescriptor::string()),
        );

        let output = executor.execute(&config, &request).await.expect("output");
        let captured = captured.await.expect("request");

        assert_eq!(output.text, r#"{"summary": "ok"}"#);
        assert_eq!(captured.request_line, "POST /v1/chat/completions HTTP/1.1");
        assert_eq!(captured.header("authorization"), Some("Bearer sk-test"));
        assert_eq!(captured.body["model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn rejected_key_keeps_the_provider_message() {
        let (base, _captured) =
            serve_once(401, r#"{"error": {"message": "Incorrect API key provided"}}"#).await;
        let executor = ChatCompletionsExecutor::new(client());
        let config = BackendConfig::new(base, "sk-wrong", "gpt-4o-mini");
        let request = GenerationRequest::new("x", SchemaDescriptor::string());

        let err = executor.execute(&config, &request).await.unwrap_err();
        assert_eq!(
            err,
            GenerationError::http_status(KIND, 401, "Incorrect API key provided")
        );
    }
}
