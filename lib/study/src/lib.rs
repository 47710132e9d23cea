//! Study content for quizsmith.
//!
//! Turns learner context into prompts, runs them through the
//! [`quizsmith_ai::Orchestrator`] and decodes the results into quizzes,
//! flashcards and mistake reviews.

pub mod content;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod schemas;

pub use content::{Difficulty, Flashcard, IncorrectAnswer, LearnerProfile, QuestionReview, QuizQuestion};
pub use error::StudyError;
pub use generator::StudyGenerator;
pub use prompt::{PromptRegistry, PromptTemplate, VariableDefinition};
