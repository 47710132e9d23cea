//! Command-line arguments.

use clap::{Parser, Subcommand, ValueEnum};
use quizsmith_ai::BackendKind;
use quizsmith_study::Difficulty;

/// Generate quizzes, flashcards and reviews with any configured AI backend.
#[derive(Debug, Parser)]
#[command(name = "quizsmith", version, about, long_about = None)]
pub struct Cli {
    /// Print generated content as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a multiple-choice quiz
    Quiz {
        /// Topic to emphasise; repeat for several
        #[arg(long = "weak-topic", value_name = "TOPIC")]
        weak_topics: Vec<String>,
    },

    /// Generate flashcards
    Flashcards {
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, default_value = "medium", value_parser = parse_difficulty)]
        difficulty: Difficulty,
        #[arg(long, default_value_t = 10)]
        count: usize,
    },

    /// List and store the models a backend offers
    Models {
        /// Backend to query; defaults to the active one
        #[arg(value_parser = parse_backend)]
        backend: Option<BackendKind>,
    },

    /// Inspect or change backend settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show the current settings with credentials redacted
    Show,

    /// Make a backend active
    Use {
        #[arg(value_parser = parse_backend)]
        backend: BackendKind,
    },

    /// Turn failover on or off
    Failover { state: Switch },

    /// Change a backend's endpoint, credential or model
    Configure {
        #[arg(value_parser = parse_backend)]
        backend: BackendKind,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        credential: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },

    /// Check that a backend has everything it needs to be called
    Check {
        #[arg(value_parser = parse_backend)]
        backend: BackendKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    #[must_use]
    pub fn enabled(self) -> bool {
        self == Self::On
    }
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    value.parse()
}

fn parse_difficulty(value: &str) -> Result<Difficulty, String> {
    value.parse()
}
