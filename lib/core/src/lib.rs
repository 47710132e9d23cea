//! Core types and utilities shared across the quizsmith crates.
//!
//! This crate provides the error-handling foundation, strongly-typed
//! identifiers and small text helpers used by the generation layer and
//! the study content built on top of it.

pub mod error;
pub mod id;
pub mod text;

pub use error::Result;
pub use id::{GenerationId, ParseIdError};
pub use text::excerpt;
