//! Command execution.

use crate::cli::{Cli, Command, SettingsCommand};
use crate::config::CliConfig;
use crate::error::CliError;
use quizsmith_ai::{
    BackendConfig, FileSettingsStore, HttpTransport, ModelCatalog, Orchestrator,
    OrchestratorSettings, SettingsStore,
};
use quizsmith_study::{Flashcard, LearnerProfile, QuizQuestion, StudyError, StudyGenerator};
use rootcause::Report;
use serde::Serialize;
use std::fmt::Write as _;
use tracing::{info, warn};

type Result<T> = quizsmith_core::Result<T, CliError>;

/// Runs one parsed command.
pub async fn run(cli: Cli, config: CliConfig) -> Result<()> {
    let store = FileSettingsStore::new(&config.settings_path);
    let mut settings = store.load_or_default().await.map_err(fail)?;

    match cli.command {
        Command::Quiz { weak_topics } => {
            let profile = config.learner.profile();
            let generator = generator(&config, store)?;
            let questions = generator
                .question_set(&mut settings, &profile, &weak_topics)
                .await
                .map_err(study_failed)?;
            emit(cli.json, questions.as_slice(), render_quiz)
        }
        Command::Flashcards {
            grade,
            subject,
            difficulty,
            count,
        } => {
            let defaults = config.learner.profile();
            let profile = LearnerProfile::new(
                grade.unwrap_or(defaults.grade),
                subject.unwrap_or(defaults.subject),
            );
            let generator = generator(&config, store)?;
            let cards = generator
                .flashcard_set(&mut settings, &profile, difficulty, count)
                .await
                .map_err(study_failed)?;
            emit(cli.json, cards.as_slice(), render_flashcards)
        }
        Command::Models { backend } => {
            let kind = backend.unwrap_or_else(|| settings.active_backend());
            let catalog = ModelCatalog::with_timeout(config.http_timeout())
                .map_err(|e| fail(CliError::Http(e.to_string())))?;
            let models = catalog
                .refresh_available_models(&mut settings, kind)
                .await
                .map_err(fail)?;
            store.save(&settings).await.map_err(fail)?;
            info!(backend = %kind, count = models.len(), "stored available models");
            emit(cli.json, &models, |models| models.join("\n"))
        }
        Command::Settings { action } => {
            run_settings(action, &mut settings, &store, cli.json).await
        }
    }
}

async fn run_settings(
    action: SettingsCommand,
    settings: &mut OrchestratorSettings,
    store: &FileSettingsStore,
    json: bool,
) -> Result<()> {
    match action {
        SettingsCommand::Show => {
            let redacted = redacted(settings);
            return emit(json, &redacted, render_settings);
        }
        SettingsCommand::Use { backend } => {
            settings.set_active(backend).map_err(fail)?;
            if let Err(e) = settings.check_backend(backend) {
                warn!(error = %e, "active backend is not ready");
            }
        }
        SettingsCommand::Failover { state } => {
            settings.set_failover_enabled(state.enabled());
        }
        SettingsCommand::Configure {
            backend,
            endpoint,
            credential,
            model,
        } => {
            let mut config = settings.backend(backend).cloned().unwrap_or_default();
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(credential) = credential {
                config.credential = credential;
            }
            if let Some(model) = model {
                config.model = model;
            }
            settings.update_backend(backend, config);
        }
        SettingsCommand::Check { backend } => {
            settings.check_backend(backend).map_err(fail)?;
            println!("{backend} is ready");
            return Ok(());
        }
    }
    store.save(settings).await.map_err(fail)?;
    info!(path = %store.path().display(), "saved settings");
    Ok(())
}

fn generator(
    config: &CliConfig,
    store: FileSettingsStore,
) -> Result<StudyGenerator<HttpTransport, FileSettingsStore>> {
    let transport = HttpTransport::with_timeout(config.http_timeout())
        .map_err(|e| fail(CliError::Http(e.to_string())))?;
    let orchestrator =
        Orchestrator::new(transport, store).with_retry_policy(config.retry.policy());
    Ok(StudyGenerator::new(orchestrator))
}

fn fail(err: impl Into<CliError>) -> Report<CliError> {
    let err: CliError = err.into();
    err.into()
}

fn study_failed(report: Report<StudyError>) -> Report<CliError> {
    let error = CliError::from(report.current_context().clone());
    report.context(error)
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, render: impl Fn(&T) -> String) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| fail(CliError::Output(e.to_string())))?;
        println!("{text}");
    } else {
        println!("{}", render(value));
    }
    Ok(())
}

/// Settings safe to print: credentials are replaced by a marker.
fn redacted(settings: &OrchestratorSettings) -> OrchestratorSettings {
    let mut out = settings.clone();
    for (kind, config) in settings.backends() {
        if !config.credential.is_empty() {
            out.update_backend(
                kind,
                BackendConfig {
                    credential: "<redacted>".to_string(),
                    ..config.clone()
                },
            );
        }
    }
    out
}

fn render_settings(settings: &OrchestratorSettings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "active backend: {}", settings.active_backend());
    let _ = writeln!(
        out,
        "failover: {}",
        if settings.failover_enabled() { "on" } else { "off" }
    );
    for (kind, config) in settings.backends() {
        let marker = if kind == settings.active_backend() { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {kind}: endpoint={} model={} credential={} models={} ready={}",
            or_dash(&config.endpoint),
            config.resolved_model(kind).unwrap_or("-"),
            if config.credential.is_empty() { "unset" } else { "set" },
            config.available_models.len(),
            if config.is_viable(kind) { "yes" } else { "no" },
        );
    }
    out.trim_end().to_string()
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn render_quiz(questions: &[QuizQuestion]) -> String {
    let mut out = String::new();
    for (index, question) in questions.iter().enumerate() {
        let _ = writeln!(out, "{}. [{}] {}", index + 1, question.topic, question.question);
        for (letter, option) in ('a'..='z').zip(&question.options) {
            let mark = if question.is_correct(option) { " (correct)" } else { "" };
            let _ = writeln!(out, "   {letter}) {option}{mark}");
        }
    }
    out.trim_end().to_string()
}

fn render_flashcards(cards: &[Flashcard]) -> String {
    cards
        .iter()
        .map(|card| format!("{}: {}", card.term, card.definition))
        .collect::<Vec<_>>()
        .join("\n")
}
