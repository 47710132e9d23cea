//! Prompt template registry.
//!
//! Templates use `{{variable}}` placeholders. Rendering is a single pass,
//! so a substituted value is never itself scanned for placeholders.

use crate::error::StudyError;
use std::collections::{BTreeMap, HashMap};

/// Name of the built-in quiz template.
pub const QUIZ_PROMPT: &str = "quiz";
/// Name of the built-in flashcard template.
pub const FLASHCARD_PROMPT: &str = "flashcards";
/// Name of the built-in mistake review template.
pub const REVIEW_PROMPT: &str = "review";

/// Topics covered by the default quiz.
pub const DEFAULT_QUIZ_TOPICS: [&str; 7] = [
    "Electric Circuits",
    "Electrical Conductors and Insulators",
    "Mains Electricity and Safety",
    "Renewable Energy",
    "The Solar System",
    "Earth and Moon Movement",
    "Space Exploration Technology",
];

/// Variables passed to [`PromptTemplate::render`].
pub type Variables = HashMap<String, String>;

/// A versioned prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Lookup key in the registry.
    pub name: String,
    pub version: String,
    /// Template text with placeholders.
    pub content: String,
    pub description: Option<String>,
    /// Declared variables, by name.
    pub variables: BTreeMap<String, VariableDefinition>,
}

/// Definition of a template variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub description: String,
    pub required: bool,
    /// Substituted when the caller does not provide a value.
    pub default: Option<String>,
}

impl VariableDefinition {
    /// A variable the caller must provide.
    #[must_use]
    pub fn required(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// A variable that may be omitted.
    #[must_use]
    pub fn optional(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required: false,
            default: None,
        }
    }

    /// Sets the value substituted when the caller omits this variable.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

impl PromptTemplate {
    /// Creates a new template at version `1.0.0` with no declared variables.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            content: content.into(),
            description: None,
            variables: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, definition: VariableDefinition) -> Self {
        self.variables.insert(name.into(), definition);
        self
    }

    /// Renders the template, falling back to declared defaults.
    ///
    /// Placeholders with neither a value nor a default are left as written.
    #[must_use]
    pub fn render(&self, variables: &Variables) -> String {
        let mut out = String::with_capacity(self.content.len());
        let mut rest = self.content.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = after[..end].trim();
            match self.value_for(name, variables) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }

    fn value_for<'a>(&'a self, name: &str, variables: &'a Variables) -> Option<&'a str> {
        variables
            .get(name)
            .map(String::as_str)
            .or_else(|| self.variables.get(name)?.default.as_deref())
    }

    /// Checks that every required variable without a default is provided.
    ///
    /// # Errors
    ///
    /// Returns the missing variable names, sorted.
    pub fn validate_variables(&self, variables: &Variables) -> Result<(), Vec<String>> {
        let missing: Vec<String> = self
            .variables
            .iter()
            .filter(|(name, def)| {
                def.required && def.default.is_none() && !variables.contains_key(*name)
            })
            .map(|(name, _)| name.clone())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Validates, then renders.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Prompt`] listing missing required variables.
    pub fn render_checked(&self, variables: &Variables) -> Result<String, StudyError> {
        self.validate_variables(variables)
            .map_err(|missing| StudyError::missing_variables(&self.name, &missing))?;
        Ok(self.render(variables))
    }
}

/// Registry of prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptRegistry {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the quiz, flashcard and review templates.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(quiz_template());
        registry.register(flashcard_template());
        registry.register(review_template());
        registry
    }

    /// Registers a template, replacing any with the same name.
    pub fn register(&mut self, template: PromptTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }

    /// Renders the named template.
    ///
    /// # Errors
    ///
    /// Returns [`StudyError::Prompt`] if the template is unknown or a
    /// required variable is missing.
    pub fn render(&self, name: &str, variables: &Variables) -> Result<String, StudyError> {
        self.get(name)
            .ok_or_else(|| StudyError::unknown_template(name))?
            .render_checked(variables)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn quiz_template() -> PromptTemplate {
    PromptTemplate::new(
        QUIZ_PROMPT,
        "Generate a new and unique {{question_count}}-question multiple-choice quiz for a \
{{grade}} student preparing for their year-end {{subject}} exam.
Mix the difficulty from very easy to very hard so the quiz properly assesses what the student knows.
Each question must have exactly 4 options and name the correct answer, which must be one of the options.
Assign each question a topic from this list, covering a variety of them:
{{topics}}

Where a question is about a circuit or electrical symbol, the question or options may contain an \
inline SVG string drawing the symbol with white strokes.

ADAPTIVE LEARNING:
Put around 60-70% of the questions on the student's weak topics listed below, asking about them \
from a new angle or in a different style than before.
Weak topics: {{weak_topics}}

Keep every question clear, unambiguous and appropriate for the grade level.",
    )
    .with_description("Adaptive multiple-choice quiz")
    .with_variable(
        "question_count",
        VariableDefinition::optional("Number of questions").with_default("10"),
    )
    .with_variable(
        "grade",
        VariableDefinition::optional("Learner grade").with_default("Grade 6"),
    )
    .with_variable(
        "subject",
        VariableDefinition::optional("Subject").with_default("Natural Sciences and Technology"),
    )
    .with_variable(
        "topics",
        VariableDefinition::optional("Curriculum topics, one per line")
            .with_default(bullet_list(DEFAULT_QUIZ_TOPICS)),
    )
    .with_variable(
        "weak_topics",
        VariableDefinition::required("Comma-separated weak topics, or None"),
    )
}

fn flashcard_template() -> PromptTemplate {
    PromptTemplate::new(
        FLASHCARD_PROMPT,
        "Create {{card_count}} study flashcards for a {{grade}} student learning {{subject}}.
Target difficulty: {{difficulty}}.
Each card has a key term and a short, accurate definition written for that grade.
Also give each card 4 options for a multiple-choice test mode: the correct definition and 3 \
plausible but wrong ones, in random order.
Do not repeat terms.",
    )
    .with_description("Term and definition flashcards")
    .with_variable("card_count", VariableDefinition::required("Number of cards"))
    .with_variable("grade", VariableDefinition::required("Learner grade"))
    .with_variable("subject", VariableDefinition::required("Subject"))
    .with_variable(
        "difficulty",
        VariableDefinition::optional("Easy, Medium or Hard").with_default("Medium"),
    )
}

fn review_template() -> PromptTemplate {
    PromptTemplate::new(
        REVIEW_PROMPT,
        "A {{grade}} {{subject}} student has just finished a quiz and answered the questions below incorrectly.
For each one, write a clear, simple and encouraging explanation of why the correct answer is right, \
easy for a 12-year-old to follow, so they can learn from the mistake.
Return one entry per question with the original question, the student's answer, the correct \
answer and your explanation.

Questions answered incorrectly:
{{mistakes}}",
    )
    .with_description("Explanations for incorrect answers")
    .with_variable(
        "grade",
        VariableDefinition::optional("Learner grade").with_default("Grade 6"),
    )
    .with_variable(
        "subject",
        VariableDefinition::optional("Subject").with_default("Natural Sciences and Technology"),
    )
    .with_variable("mistakes", VariableDefinition::required("Numbered list of mistakes"))
}

fn bullet_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items
        .into_iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
