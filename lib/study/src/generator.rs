//! Typed study content on top of the generation orchestrator.

use crate::content::{Difficulty, Flashcard, IncorrectAnswer, LearnerProfile, QuestionReview, QuizQuestion};
use crate::error::StudyError;
use crate::prompt::{FLASHCARD_PROMPT, PromptRegistry, QUIZ_PROMPT, REVIEW_PROMPT, Variables};
use crate::schemas;
use quizsmith_ai::{
    GenerationError, GenerationRequest, Orchestrator, OrchestratorSettings, SettingsStore,
    Transport,
};
use rootcause::Report;
use serde::de::DeserializeOwned;
use std::fmt::Write as _;
use tracing::{debug, instrument};

/// Sampling temperature for quizzes.
pub const QUIZ_TEMPERATURE: f64 = 0.8;
/// Sampling temperature for flashcards.
pub const FLASHCARD_TEMPERATURE: f64 = 0.7;
/// Sampling temperature for reviews.
pub const REVIEW_TEMPERATURE: f64 = 0.5;

/// Generates quizzes, flashcards and reviews.
#[derive(Debug, Clone)]
pub struct StudyGenerator<T, S> {
    orchestrator: Orchestrator<T, S>,
    prompts: PromptRegistry,
}

impl<T: Transport, S: SettingsStore> StudyGenerator<T, S> {
    /// Creates a generator with the built-in prompts.
    #[must_use]
    pub fn new(orchestrator: Orchestrator<T, S>) -> Self {
        Self {
            orchestrator,
            prompts: PromptRegistry::builtin(),
        }
    }

    /// Replaces the prompt registry.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptRegistry) -> Self {
        self.prompts = prompts;
        self
    }

    /// Generates a quiz for `profile`, weighted towards `weak_topics`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::EmptyContent`] if no questions come back, and
    /// otherwise the generation, decode or prompt error.
    #[instrument(skip(self, settings))]
    pub async fn question_set(
        &self,
        settings: &mut OrchestratorSettings,
        profile: &LearnerProfile,
        weak_topics: &[String],
    ) -> quizsmith_core::Result<Vec<QuizQuestion>, StudyError> {
        let weak = if weak_topics.is_empty() {
            "None".to_string()
        } else {
            weak_topics.join(", ")
        };
        let variables = Variables::from([
            ("grade".to_string(), profile.grade.clone()),
            ("subject".to_string(), profile.subject.clone()),
            ("weak_topics".to_string(), weak),
        ]);
        let prompt = self.prompts.render(QUIZ_PROMPT, &variables)?;

        let request = GenerationRequest::new(prompt, schemas::quiz_questions())
            .with_temperature(QUIZ_TEMPERATURE)
            .strict();
        let questions: Vec<QuizQuestion> = self.generate(settings, &request, "quiz questions").await?;
        if questions.is_empty() {
            return Err(StudyError::EmptyContent {
                content: "quiz questions",
            }
            .into());
        }
        debug!(count = questions.len(), "generated quiz");
        Ok(questions)
    }

    /// Generates `count` flashcards for `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::EmptyContent`] if no cards come back, and
    /// otherwise the generation, decode or prompt error.
    #[instrument(skip(self, settings))]
    pub async fn flashcard_set(
        &self,
        settings: &mut OrchestratorSettings,
        profile: &LearnerProfile,
        difficulty: Difficulty,
        count: usize,
    ) -> quizsmith_core::Result<Vec<Flashcard>, StudyError> {
        let variables = Variables::from([
            ("card_count".to_string(), count.to_string()),
            ("grade".to_string(), profile.grade.clone()),
            ("subject".to_string(), profile.subject.clone()),
            ("difficulty".to_string(), difficulty.to_string()),
        ]);
        let prompt = self.prompts.render(FLASHCARD_PROMPT, &variables)?;

        let request = GenerationRequest::new(prompt, schemas::flashcards())
            .with_temperature(FLASHCARD_TEMPERATURE)
            .strict();
        let cards: Vec<Flashcard> = self.generate(settings, &request, "flashcards").await?;
        if cards.is_empty() {
            return Err(StudyError::EmptyContent {
                content: "flashcards",
            }
            .into());
        }
        debug!(count = cards.len(), "generated flashcards");
        Ok(cards)
    }

    /// Explains each incorrect answer at the level of `profile`.
    ///
    /// An empty `incorrect` list returns an empty review without calling
    /// any backend.
    ///
    /// # Errors
    ///
    /// Returns the generation, decode or prompt error.
    #[instrument(skip_all, fields(mistakes = incorrect.len(), grade = %profile.grade))]
    pub async fn mistake_review(
        &self,
        settings: &mut OrchestratorSettings,
        profile: &LearnerProfile,
        incorrect: &[IncorrectAnswer],
    ) -> quizsmith_core::Result<Vec<QuestionReview>, StudyError> {
        if incorrect.is_empty() {
            return Ok(Vec::new());
        }

        let variables = Variables::from([
            ("grade".to_string(), profile.grade.clone()),
            ("subject".to_string(), profile.subject.clone()),
            ("mistakes".to_string(), describe_mistakes(incorrect)),
        ]);
        let prompt = self.prompts.render(REVIEW_PROMPT, &variables)?;

        let request = GenerationRequest::new(prompt, schemas::question_reviews())
            .with_temperature(REVIEW_TEMPERATURE)
            .strict();
        self.generate(settings, &request, "question reviews").await
    }

    async fn generate<C: DeserializeOwned>(
        &self,
        settings: &mut OrchestratorSettings,
        request: &GenerationRequest,
        content: &'static str,
    ) -> quizsmith_core::Result<C, StudyError> {
        let result = self
            .orchestrator
            .generate(settings, request)
            .await
            .map_err(generation_failed)?;
        result.decode().map_err(|e| {
            StudyError::Decode {
                content,
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Layers a study error over the orchestrator's report, keeping it as the
/// cause.
fn generation_failed(report: Report<GenerationError>) -> Report<StudyError> {
    let error = StudyError::Generation(report.current_context().clone());
    report.context(error)
}

fn describe_mistakes(incorrect: &[IncorrectAnswer]) -> String {
    let mut out = String::new();
    for (index, item) in incorrect.iter().enumerate() {
        let _ = write!(
            out,
            "Item {}:\n- Question: \"{}\"\n- Their answer: \"{}\"\n- Correct answer: \"{}\"\n",
            index + 1,
            item.question.question,
            item.user_answer,
            item.question.correct_answer,
        );
    }
    out
}
