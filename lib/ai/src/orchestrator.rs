//! Failover orchestrator: the single entry point for structured generation.
//!
//! Each call runs a two-state machine:
//! 1. **Active**: the active backend is tried under the retry policy.
//! 2. **Scanning**: if that fails and failover is enabled, every other
//!    viable backend is tried in order, one at a time, under the same
//!    policy. The first success becomes the new active backend and the
//!    settings are saved.
//!
//! Candidates are never raced: concurrent attempts would spend quota on
//! several paid backends and make "first success wins" nondeterministic.

use crate::backend::{BackendConfig, BackendKind, GenerationRequest, GenerationResult, Transport};
use crate::error::{BackendFailure, GenerationError};
use crate::extract::extract;
use crate::retry::{RetryPolicy, with_retry};
use crate::settings::{OrchestratorSettings, SettingsStore};
use quizsmith_core::GenerationId;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};

/// Runs generation requests against the configured backends.
#[derive(Debug, Clone)]
pub struct Orchestrator<T, S> {
    transport: T,
    store: S,
    retry: RetryPolicy,
}

impl<T: Transport, S: SettingsStore> Orchestrator<T, S> {
    /// Creates an orchestrator with the default retry policy.
    #[must_use]
    pub fn new(transport: T, store: S) -> Self {
        Self {
            transport,
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy applied to each backend.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Generates a structured result for `request`.
    ///
    /// On success through a failover candidate, `settings` is updated to
    /// make that candidate active and saved through the store. Otherwise
    /// `settings` is left untouched.
    ///
    /// # Errors
    ///
    /// With failover disabled, the active backend's error is returned
    /// unchanged. With failover enabled and no backend succeeding,
    /// [`GenerationError::Exhausted`] lists every failure.
    pub async fn generate(
        &self,
        settings: &mut OrchestratorSettings,
        request: &GenerationRequest,
    ) -> quizsmith_core::Result<GenerationResult, GenerationError> {
        let span = info_span!(
            "generate",
            generation = %GenerationId::new(),
            active = %settings.active_backend(),
        );
        self.run(settings, request).instrument(span).await
    }

    /// Like [`generate`](Self::generate), for settings shared between
    /// callers.
    ///
    /// The lock is held for the whole call, so concurrent callers are
    /// serialized and the active-backend update cannot race.
    ///
    /// # Errors
    ///
    /// Same as [`generate`](Self::generate).
    pub async fn generate_shared(
        &self,
        settings: &Mutex<OrchestratorSettings>,
        request: &GenerationRequest,
    ) -> quizsmith_core::Result<GenerationResult, GenerationError> {
        let mut guard = settings.lock().await;
        self.generate(&mut guard, request).await
    }

    async fn run(
        &self,
        settings: &mut OrchestratorSettings,
        request: &GenerationRequest,
    ) -> quizsmith_core::Result<GenerationResult, GenerationError> {
        let active = settings.active_backend();
        let active_error = match self
            .attempt_backend(active, settings.active_config(), request)
            .await
        {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };

        if !settings.failover_enabled() {
            warn!(backend = %active, error = %active_error, "generation failed, failover disabled");
            return Err(active_error.into());
        }

        warn!(backend = %active, error = %active_error, "active backend failed, scanning for a fallback");
        let mut failures = vec![BackendFailure {
            backend: active,
            error: active_error,
        }];

        let candidates = settings.failover_candidates(active);
        debug!(?candidates, "failover candidates");

        for candidate in candidates {
            let Some(config) = settings.backend(candidate) else {
                continue;
            };
            match self.attempt_backend(candidate, config, request).await {
                Ok(result) => {
                    settings.promote(candidate);
                    info!(from = %active, to = %candidate, "failover succeeded, switching active backend");
                    if let Err(error) = self.store.save(settings).await {
                        warn!(%error, "failed to persist active backend after failover");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    warn!(backend = %candidate, %error, "failover candidate failed");
                    failures.push(BackendFailure {
                        backend: candidate,
                        error,
                    });
                }
            }
        }

        Err(GenerationError::Exhausted { failures }.into())
    }

    /// One backend attempt under the retry policy.
    async fn attempt_backend(
        &self,
        kind: BackendKind,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        // Checked here so no transport is ever invoked for an unusable backend.
        config.validate(kind)?;
        with_retry(&self.retry, || self.attempt_once(kind, config, request)).await
    }

    async fn attempt_once(
        &self,
        kind: BackendKind,
        config: &BackendConfig,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let raw = self.transport.execute(kind, config, request).await?;
        let value = extract(&raw.text)?;
        if request.is_strict() {
            request.schema().check(&value).map_err(|violation| {
                GenerationError::parse(
                    format!("output does not match schema: {violation}"),
                    quizsmith_core::excerpt(&raw.text, crate::extract::ERROR_EXCERPT_CHARS),
                )
            })?;
        }
        Ok(GenerationResult::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendConfig, RawOutput};
    use crate::schema::SchemaDescriptor;
    use crate::settings::MemorySettingsStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    type Reply = Result<String, GenerationError>;

    /// Transport that replays scripted replies per backend and records
    /// every call.
    #[derive(Default, Clone)]
    struct ScriptedTransport {
        scripts: Arc<StdMutex<HashMap<BackendKind, VecDeque<Reply>>>>,
        calls: Arc<StdMutex<Vec<BackendKind>>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self::default()
        }

        fn script(self, kind: BackendKind, replies: Vec<Reply>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(kind, replies.into_iter().collect());
            self
        }

        fn calls(&self) -> Vec<BackendKind> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_to(&self, kind: BackendKind) -> usize {
            self.calls().into_iter().filter(|k| *k == kind).count()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            kind: BackendKind,
            _config: &BackendConfig,
            _request: &GenerationRequest,
        ) -> Result<RawOutput, GenerationError> {
            self.calls.lock().unwrap().push(kind);
            let reply = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&kind)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(GenerationError::transport(kind, "no scripted reply")));
            reply.map(RawOutput::new)
        }
    }

    fn ok(text: &str) -> Reply {
        Ok(text.to_string())
    }

    fn down(kind: BackendKind) -> Reply {
        Err(GenerationError::http_status(kind, 503, "service unavailable"))
    }

    fn flashcard_request() -> GenerationRequest {
        GenerationRequest::new(
            "Make flashcards about the solar system",
            SchemaDescriptor::array(
                SchemaDescriptor::object()
                    .field("term", SchemaDescriptor::string())
                    .field("definition", SchemaDescriptor::string()),
            ),
        )
    }

    const CARDS: &str = r#"[{"term": "Orbit", "definition": "Curved path around a star"}]"#;

    fn all_configured(failover: bool) -> OrchestratorSettings {
        let per_backend = BTreeMap::from([
            (
                BackendKind::NativeStructured,
                BackendConfig::new("", "native-key", ""),
            ),
            (
                BackendKind::ChatCompletionsJson,
                BackendConfig::new("https://api.example.com/v1", "sk", "gpt-4o-mini"),
            ),
            (
                BackendKind::LocalGenerateJson,
                BackendConfig::new("http://localhost:11434", "", "llama3"),
            ),
            (
                BackendKind::EdgeInferenceJson,
                BackendConfig::new("https://edge.example.com/ai/run", "token", "@cf/meta/llama-3-8b-instruct"),
            ),
        ]);
        OrchestratorSettings::new(BackendKind::NativeStructured, per_backend, failover)
            .expect("valid settings")
    }

    fn orchestrator(
        transport: ScriptedTransport,
    ) -> (Orchestrator<ScriptedTransport, MemorySettingsStore>, MemorySettingsStore) {
        let store = MemorySettingsStore::new();
        let orchestrator = Orchestrator::new(transport, store.clone());
        (orchestrator, store)
    }

    #[tokio::test(start_paused = true)]
    async fn every_backend_returns_schema_conforming_value() {
        for kind in BackendKind::ALL {
            let transport = ScriptedTransport::new().script(kind, vec![ok(CARDS)]);
            let (orchestrator, store) = orchestrator(transport);
            let mut settings = all_configured(true);
            settings.set_active(kind).expect("configured");

            let request = flashcard_request().strict();
            let result = orchestrator
                .generate(&mut settings, &request)
                .await
                .expect("generation succeeds");

            assert!(request.schema().check(result.value()).is_ok());
            assert_eq!(settings.active_backend(), kind);
            assert_eq!(store.save_count(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_within_budget_do_not_fail_over() {
        let native = BackendKind::NativeStructured;
        let transport = ScriptedTransport::new().script(native, vec![down(native), ok(CARDS)]);
        let (orchestrator, store) = orchestrator(transport.clone());
        let mut settings = all_configured(true);

        let result = orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .expect("generation succeeds");

        assert_eq!(result.value()[0]["term"], "Orbit");
        assert_eq!(transport.calls(), vec![native, native]);
        assert_eq!(settings.active_backend(), native);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_of_two_never_reaches_a_fourth_attempt() {
        let native = BackendKind::NativeStructured;
        let chat = BackendKind::ChatCompletionsJson;
        // Succeeds only on the fourth call, which must never happen.
        let transport = ScriptedTransport::new()
            .script(native, vec![down(native), down(native), down(native), ok("[]")])
            .script(chat, vec![ok(CARDS)]);
        let (orchestrator, store) = orchestrator(transport.clone());
        let mut settings = all_configured(true);

        orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .expect("failover succeeds");

        assert_eq!(transport.calls_to(native), 3);
        assert_eq!(transport.calls(), vec![native, native, native, chat]);
        assert_eq!(settings.active_backend(), chat);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_third_attempt_stays_on_active_backend() {
        let native = BackendKind::NativeStructured;
        let transport =
            ScriptedTransport::new().script(native, vec![down(native), down(native), ok(CARDS)]);
        let (orchestrator, _store) = orchestrator(transport.clone());
        let mut settings = all_configured(true);

        orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .expect("third attempt succeeds");

        assert_eq!(transport.calls_to(native), 3);
        assert_eq!(settings.active_backend(), native);
    }

    #[tokio::test(start_paused = true)]
    async fn misconfigured_active_backend_fails_over_and_persists() {
        let chat = BackendKind::ChatCompletionsJson;
        let local = BackendKind::LocalGenerateJson;
        let transport = ScriptedTransport::new().script(local, vec![ok(CARDS)]);
        let (orchestrator, store) = orchestrator(transport.clone());

        let mut settings = all_configured(true);
        // Active backend A is missing its endpoint.
        settings.update_backend(chat, BackendConfig::new("", "sk", "gpt-4o-mini"));
        settings.update_backend(BackendKind::NativeStructured, BackendConfig::default());
        settings.set_active(chat).expect("configured");

        let result = orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .expect("failover succeeds");

        assert_eq!(result.into_value(), serde_json::from_str::<serde_json::Value>(CARDS).unwrap());
        assert_eq!(settings.active_backend(), local);
        assert_eq!(transport.calls(), vec![local], "misconfigured backends are never called");
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.saved().map(|s| s.active_backend()), Some(local));
    }

    #[tokio::test(start_paused = true)]
    async fn failover_disabled_propagates_original_error() {
        let native = BackendKind::NativeStructured;
        let transport = ScriptedTransport::new()
            .script(native, vec![down(native), down(native), down(native)])
            .script(BackendKind::ChatCompletionsJson, vec![ok(CARDS)]);
        let (orchestrator, store) = orchestrator(transport.clone());
        let mut settings = all_configured(false);

        let report = orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .unwrap_err();

        assert_eq!(report.current_context(), &GenerationError::http_status(native, 503, "service unavailable"));
        assert_eq!(settings.active_backend(), native);
        assert_eq!(transport.calls_to(BackendKind::ChatCompletionsJson), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_viable_raises_exhaustion_without_mutation() {
        let per_backend = BTreeMap::from([
            (BackendKind::NativeStructured, BackendConfig::default()),
            (BackendKind::ChatCompletionsJson, BackendConfig::new("", "", "")),
        ]);
        let mut settings =
            OrchestratorSettings::new(BackendKind::NativeStructured, per_backend, true)
                .expect("valid settings");
        let before = settings.clone();
        let transport = ScriptedTransport::new();
        let (orchestrator, store) = orchestrator(transport.clone());

        let report = orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .unwrap_err();

        match report.current_context() {
            GenerationError::Exhausted { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].backend, BackendKind::NativeStructured);
                assert!(matches!(failures[0].error, GenerationError::Configuration { .. }));
            }
            other => panic!("expected exhaustion, got {other}"),
        }
        assert_eq!(settings, before);
        assert!(transport.calls().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn every_candidate_failing_raises_exhaustion_in_order() {
        let native = BackendKind::NativeStructured;
        let chat = BackendKind::ChatCompletionsJson;
        let local = BackendKind::LocalGenerateJson;
        let edge = BackendKind::EdgeInferenceJson;
        let transport = ScriptedTransport::new()
            .script(native, vec![ok("I cannot help with that.")])
            .script(chat, vec![ok("still not json")])
            .script(local, vec![down(local), down(local), down(local)])
            .script(edge, vec![ok("nope")]);
        let (orchestrator, store) = orchestrator(transport.clone());
        let mut settings = all_configured(true);

        let report = orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .unwrap_err();

        let GenerationError::Exhausted { failures } = report.current_context() else {
            panic!("expected exhaustion");
        };
        let order: Vec<BackendKind> = failures.iter().map(|f| f.backend).collect();
        assert_eq!(order, vec![native, chat, local, edge]);
        assert!(matches!(failures[0].error, GenerationError::Parse { .. }));
        assert!(failures[2].error.is_transient());
        // Parse errors are not retried, transport errors are.
        assert_eq!(transport.calls(), vec![native, chat, local, local, local, edge]);
        assert_eq!(settings.active_backend(), native);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_wins_and_later_candidates_are_untouched() {
        let native = BackendKind::NativeStructured;
        let local = BackendKind::LocalGenerateJson;
        let transport = ScriptedTransport::new()
            .script(native, vec![ok("no json here")])
            .script(BackendKind::ChatCompletionsJson, vec![Err(GenerationError::configuration(
                BackendKind::ChatCompletionsJson,
                "rejected",
            ))])
            .script(local, vec![ok(&format!("```json\n{CARDS}\n```"))])
            .script(BackendKind::EdgeInferenceJson, vec![ok(CARDS)]);
        let (orchestrator, _store) = orchestrator(transport.clone());
        let mut settings = all_configured(true);

        orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .expect("failover succeeds");

        assert_eq!(settings.active_backend(), local);
        assert_eq!(transport.calls_to(BackendKind::EdgeInferenceJson), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sticky_backend_is_used_first_on_the_next_call() {
        let native = BackendKind::NativeStructured;
        let chat = BackendKind::ChatCompletionsJson;
        let transport = ScriptedTransport::new()
            .script(native, vec![down(native), down(native), down(native)])
            .script(chat, vec![ok(CARDS), ok(CARDS)]);
        let (orchestrator, _store) = orchestrator(transport.clone());
        let mut settings = all_configured(true);

        orchestrator.generate(&mut settings, &flashcard_request()).await.expect("first call");
        orchestrator.generate(&mut settings, &flashcard_request()).await.expect("second call");

        assert_eq!(transport.calls(), vec![native, native, native, chat, chat]);
    }

    #[tokio::test(start_paused = true)]
    async fn strict_request_rejects_wrong_shape_without_retry() {
        let native = BackendKind::NativeStructured;
        let transport = ScriptedTransport::new().script(native, vec![ok(r#"[{"term": "Orbit"}]"#)]);
        let (orchestrator, _store) = orchestrator(transport.clone());
        let mut settings = all_configured(false);

        let report = orchestrator
            .generate(&mut settings, &flashcard_request().strict())
            .await
            .unwrap_err();

        assert!(matches!(report.current_context(), GenerationError::Parse { .. }));
        assert!(report.current_context().to_string().contains("$[0].definition"));
        assert_eq!(transport.calls_to(native), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lenient_request_passes_wrong_shape_through() {
        let native = BackendKind::NativeStructured;
        let transport = ScriptedTransport::new().script(native, vec![ok(r#"{"unexpected": true}"#)]);
        let (orchestrator, _store) = orchestrator(transport);
        let mut settings = all_configured(false);

        let result = orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .expect("lenient");
        assert_eq!(result.into_value(), json!({"unexpected": true}));
    }

    #[tokio::test(start_paused = true)]
    async fn lenient_request_rejects_truncated_array() {
        let native = BackendKind::NativeStructured;
        let truncated = r#"[{"term": "Orbit", "definition": "Path"}, {"term": "Moon", "defin"#;
        let transport = ScriptedTransport::new().script(native, vec![ok(truncated)]);
        let (orchestrator, _store) = orchestrator(transport.clone());
        let mut settings = all_configured(false);

        let report = orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .unwrap_err();

        assert!(matches!(report.current_context(), GenerationError::Parse { .. }));
        assert_eq!(transport.calls_to(native), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_still_returns_result() {
        let native = BackendKind::NativeStructured;
        let chat = BackendKind::ChatCompletionsJson;
        let transport = ScriptedTransport::new()
            .script(native, vec![ok("nope")])
            .script(chat, vec![ok(CARDS)]);
        let store = MemorySettingsStore::new();
        store.fail_saves();
        let orchestrator = Orchestrator::new(transport, store.clone());
        let mut settings = all_configured(true);

        orchestrator
            .generate(&mut settings, &flashcard_request())
            .await
            .expect("result is returned");
        assert_eq!(settings.active_backend(), chat);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_retry_policy_is_applied() {
        let native = BackendKind::NativeStructured;
        let transport = ScriptedTransport::new().script(native, vec![down(native), ok(CARDS)]);
        let (orchestrator, _store) = orchestrator(transport.clone());
        let orchestrator = orchestrator.with_retry_policy(RetryPolicy::none());
        let mut settings = all_configured(false);

        assert!(orchestrator.generate(&mut settings, &flashcard_request()).await.is_err());
        assert_eq!(transport.calls_to(native), 1);
        assert_eq!(orchestrator.retry_policy().initial_delay, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn shared_settings_are_updated_under_the_lock() {
        let native = BackendKind::NativeStructured;
        let chat = BackendKind::ChatCompletionsJson;
        let transport = ScriptedTransport::new()
            .script(native, vec![ok("nope")])
            .script(chat, vec![ok(CARDS)]);
        let (orchestrator, store) = orchestrator(transport);
        let settings = Mutex::new(all_configured(true));

        orchestrator
            .generate_shared(&settings, &flashcard_request())
            .await
            .expect("failover succeeds");

        assert_eq!(settings.lock().await.active_backend(), chat);
        assert_eq!(store.save_count(), 1);
    }
}
