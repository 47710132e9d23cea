//! HTTP transports, one executor per backend kind.
//!
//! [`HttpTransport`] owns a shared `reqwest::Client` and dispatches each
//! request to the executor for the requested [`BackendKind`] with an
//! exhaustive match.

mod chat_completions;
mod edge_inference;
mod local_generate;
mod native;

pub use chat_completions::ChatCompletionsExecutor;
pub use edge_inference::EdgeInferenceExecutor;
pub use local_generate::LocalGenerateExecutor;
pub use native::{DEFAULT_NATIVE_ENDPOINT, NativeStructuredExecutor};

use crate::backend::{BackendConfig, BackendKind, GenerationRequest, RawOutput, Transport, TransportExecutor};
use crate::error::GenerationError;
use async_trait::async_trait;
use quizsmith_core::excerpt;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Characters of an error body kept in transport errors.
const ERROR_BODY_CHARS: usize = 300;

/// Production transport speaking every backend's wire protocol over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    native: NativeStructuredExecutor,
    chat: ChatCompletionsExecutor,
    local: LocalGenerateExecutor,
    edge: EdgeInferenceExecutor,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::from_client(client))
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            native: NativeStructuredExecutor::new(client.clone()),
            chat: ChatCompletionsExecutor::new(client.clone()),
            local: LocalGenerateExecutor::new(client.clone()),
            edge: EdgeInferenceExecutor::new(client),
        }
    }

    /// Returns the executor for `kind`.
    #[must_use]
    pub fn executor(&self, kind: BackendKind) -> &dyn TransportExecutor {
        match kind {
            BackendKind::NativeStructured => &self.native,
            BackendKind::ChatCompletionsJson => &self.chat,
            BackendKind::LocalGenerateJson => &self.local,
            BackendKind::EdgeInferenceJson => &self.edge,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        kind: BackendKind,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<RawOutput, GenerationError> {
        self.executor(kind).execute(config, request).await
    }
}

/// Sends a prepared request and returns the decoded JSON envelope.
///
/// Connection failures and non-success statuses become transport errors;
/// a success body that is not JSON becomes a parse error.
pub(crate) async fn send_json(
    kind: BackendKind,
    request: reqwest::RequestBuilder,
) -> Result<JsonValue, GenerationError> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::transport(kind, e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GenerationError::transport(kind, format!("failed to read body: {e}")))?;

    if !status.is_success() {
        let message = serde_json::from_str::<JsonValue>(&body)
            .ok()
            .and_then(|json| error_message(&json))
            .unwrap_or_else(|| excerpt(body.trim(), ERROR_BODY_CHARS));
        return Err(GenerationError::http_status(kind, status.as_u16(), message));
    }

    serde_json::from_str(&body).map_err(|e| {
        GenerationError::parse(
            format!("{kind} response envelope is not JSON: {e}"),
            excerpt(body.trim(), ERROR_BODY_CHARS),
        )
    })
}

/// Pulls a human-readable message out of a provider error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"errors": [{"message": ..}]}`.
pub(crate) fn error_message(json: &JsonValue) -> Option<String> {
    let error = json.get("error");
    if let Some(message) = error
        .and_then(|e| e.get("message"))
        .and_then(JsonValue::as_str)
    {
        return Some(message.to_string());
    }
    if let Some(message) = error.and_then(JsonValue::as_str) {
        return Some(message.to_string());
    }
    json.get("errors")
        .and_then(JsonValue::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("message"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

/// Reads the string at `pointer` in a response envelope.
pub(crate) fn text_at(
    kind: BackendKind,
    envelope: &JsonValue,
    pointer: &str,
) -> Result<String, GenerationError> {
    envelope
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::parse(
                format!("{kind} response has no text at {pointer}"),
                excerpt(&envelope.to_string(), ERROR_BODY_CHARS),
            )
        })
}

/// System message sent to chat-style backends.
pub(crate) const JSON_SYSTEM_PROMPT: &str =
    "You are a content generator that only ever replies with valid JSON.";

/// One-shot HTTP server for exercising executors over a real socket.
#[cfg(test)]
pub(crate) mod stub_server {
    use serde_json::Value as JsonValue;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// A request as the stub received it.
    #[derive(Debug)]
    pub(crate) struct Captured {
        pub request_line: String,
        headers: Vec<(String, String)>,
        pub body: JsonValue,
    }

    impl Captured {
        pub(crate) fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    /// Answers a single request with `status` and `body`.
    ///
    /// Returns the server's base URL and a receiver for the captured
    /// request.
    pub(crate) async fn serve_once(status: u16, body: &str) -> (String, oneshot::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the request head");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
            let mut lines = head.split("\r\n");
            let request_line = lines.next().unwrap_or_default().to_string();
            let headers: Vec<(String, String)> = lines
                .filter_map(|line| line.split_once(':'))
                .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
                .collect();
            let length = headers
                .iter()
                .find(|(key, _)| key == "content-length")
                .and_then(|(_, value)| value.parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            let _ = tx.send(Captured {
                request_line,
                headers,
                body: serde_json::from_slice(&buf[head_end..]).unwrap_or(JsonValue::Null),
            });
        });

        (format!("http://{addr}"), rx)
    }

    /// A client that ignores proxy settings from the environment.
    pub(crate) fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }
}
