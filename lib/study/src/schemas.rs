//! Schemas for each kind of study content.

use quizsmith_ai::SchemaDescriptor;

/// An array of quiz questions.
#[must_use]
pub fn quiz_questions() -> SchemaDescriptor {
    SchemaDescriptor::array(
        SchemaDescriptor::object()
            .field("question", SchemaDescriptor::string().described("The quiz question."))
            .field(
                "options",
                SchemaDescriptor::array(SchemaDescriptor::string())
                    .described("Exactly 4 possible answers. May include SVG strings for symbols."),
            )
            .field(
                "correctAnswer",
                SchemaDescriptor::string()
                    .described("The correct answer, copied exactly from the options."),
            )
            .field(
                "topic",
                SchemaDescriptor::string()
                    .described("The curriculum topic this question assesses."),
            ),
    )
}

/// An array of flashcards.
#[must_use]
pub fn flashcards() -> SchemaDescriptor {
    SchemaDescriptor::array(
        SchemaDescriptor::object()
            .field("term", SchemaDescriptor::string())
            .field("definition", SchemaDescriptor::string())
            .optional_field(
                "options",
                SchemaDescriptor::array(SchemaDescriptor::string())
                    .described("4 candidate definitions, one of them correct."),
            ),
    )
}

/// An array of mistake reviews.
#[must_use]
pub fn question_reviews() -> SchemaDescriptor {
    SchemaDescriptor::array(
        SchemaDescriptor::object()
            .field("question", SchemaDescriptor::string())
            .field("userAnswer", SchemaDescriptor::string())
            .field("correctAnswer", SchemaDescriptor::string())
            .field(
                "explanation",
                SchemaDescriptor::string()
                    .described("A simple explanation of the correct answer for the learner's grade."),
            ),
    )
}
