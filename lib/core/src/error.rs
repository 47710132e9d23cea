//! Shared `Result` alias.
//!
//! Crates keep their own error enums and report them through
//! `rootcause::Report` at public boundaries.

use rootcause::Report;

/// Result whose error is a `Report` carrying the domain error `C`.
///
/// Callers read the typed error back with `Report::current_context()`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
