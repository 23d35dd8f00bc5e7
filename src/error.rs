//! Error types flowing through the engine, per spec.md §7.
//!
//! The Go original threads a plain `error` through every `Parse` call and
//! builds the `"...\nwhile in <rule>"` chain and the newline-joined
//! alternation aggregate by hand (`PolyError` in `original_source`). This
//! crate keeps that textual contract exactly (tests assert on the rendered
//! string) but wraps it in a `thiserror`-derived enum so call sites get
//! `?`-propagation and `std::error::Error` for free, following the pattern
//! the pack's `vais-parser` crate uses for its own hand-rolled parser.

use thiserror::Error;

/// A parse failure: either a single diagnostic at a grapheme position, or a
/// poly-error aggregating several (from a failed [`crate::expr::Expression::Choice`]).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError(message.into())
    }

    /// Wraps this failure with a rule-frame annotation, as a rule unwinds.
    pub fn in_rule(self, rule_name: &str) -> Self {
        ParseError(format!("{}\nwhile in {}", self.0, rule_name))
    }

    /// Aggregates sibling failures from a failed ordered choice.
    pub fn aggregate(errors: Vec<ParseError>) -> Self {
        ParseError(
            errors
                .into_iter()
                .map(|e| e.0)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An error returned by a handler [`crate::handler::Converter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError(message.into())
    }
}

impl std::error::Error for HandlerError {}

impl From<HandlerError> for ParseError {
    fn from(e: HandlerError) -> Self {
        ParseError(e.0)
    }
}

/// Template runtime errors (spec.md §7): missing partial, empty partial name.
/// Never recovered by the engine, unlike parse failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("no partial named {0}")]
    NoSuchPartial(String),
    #[error("partial cannot be given empty name")]
    EmptyPartialName,
    #[error("{0}")]
    Parse(#[from] ParseError),
}

/// Top-level error for the CLI binary (spec.md §6 external interfaces).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}
