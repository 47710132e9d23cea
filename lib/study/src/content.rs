//! Study content produced by generation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A multiple-choice quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    /// Possible answers. May contain inline SVG for symbols.
    pub options: Vec<String>,
    /// One of `options`.
    pub correct_answer: String,
    /// Curriculum topic the question assesses.
    pub topic: String,
}

impl QuizQuestion {
    /// Whether `answer` is the correct one.
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer.trim() == answer.trim()
    }
}

/// A term and its definition, optionally with multiple-choice options for
/// test mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Explanation of one answer the learner got wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub explanation: String,
}

/// A question answered incorrectly, as input for a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncorrectAnswer {
    pub question: QuizQuestion,
    pub user_answer: String,
}

/// Who the content is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProfile {
    /// e.g. "Grade 6"
    pub grade: String,
    /// e.g. "Natural Sciences and Technology"
    pub subject: String,
}

impl LearnerProfile {
    #[must_use]
    pub fn new(grade: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            grade: grade.into(),
            subject: subject.into(),
        }
    }
}

/// Flashcard difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quiz_question_uses_camel_case_fields() {
        let question: QuizQuestion = serde_json::from_value(json!({
            "question": "Which material is a conductor?",
            "options": ["Copper", "Rubber", "Glass", "Wood"],
            "correctAnswer": "Copper",
            "topic": "Electrical Conductors and Insulators",
        }))
        .expect("decodes");
        assert_eq!(question.correct_answer, "Copper");
        assert!(question.is_correct(" Copper"));
        assert!(!question.is_correct("Rubber"));
    }

    #[test]
    fn flashcard_options_are_optional() {
        let card: Flashcard =
            serde_json::from_value(json!({"term": "Orbit", "definition": "Path around a star"}))
                .expect("decodes");
        assert_eq!(card.options, None);
        assert_eq!(
            serde_json::to_value(&card).expect("encodes"),
            json!({"term": "Orbit", "definition": "Path around a star"})
        );
    }

    #[test]
    fn review_requires_every_field() {
        let result = serde_json::from_value::<QuestionReview>(json!({
            "question": "q",
            "userAnswer": "a",
            "correctAnswer": "b",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" easy ".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("extreme".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }
}
