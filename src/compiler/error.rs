//! Error types for the template compiler.

use std::fmt;
use thiserror::Error;

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Syntax error raised by the template parser, with a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Line {}:{}] {}", self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Errors that abort a compilation run.
///
/// None of these are recoverable: an error inside a nested component unit
/// aborts the whole document.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Template source failed to parse.
    #[error("parse error in `{unit}`: {source}")]
    Parse { unit: String, source: ParseError },

    /// The parsed template produced no top-level nodes.
    #[error("no nodes to compile in `{unit}`")]
    EmptyDocument { unit: String },

    /// `render_document` was called before `parse`.
    #[error("render requested before any template was parsed")]
    RenderBeforeParse,

    /// A unit may only be rewritten once.
    #[error("unit `{unit}` has already been rewritten")]
    AlreadyRewritten { unit: String },

    /// Emission requires a fully rewritten unit.
    #[error("unit `{unit}` has not been rewritten yet")]
    NotRewritten { unit: String },

    /// Emission is terminal.
    #[error("unit `{unit}` has already been emitted")]
    AlreadyEmitted { unit: String },

    /// An include node survived until the rewrite pass.
    #[error("include `{path}` was not resolved before compilation")]
    UnresolvedInclude { path: String },

    /// The include resolver could not provide the file.
    #[error("failed to include `{path}`: {reason}")]
    Include { path: String, reason: String },

    /// An include chain leads back to itself.
    #[error("include cycle detected at `{path}`")]
    IncludeCycle { path: String },

    /// Two components would be emitted under the same callable name.
    #[error("component `{name}` is defined more than once")]
    DuplicateComponent { name: String },

    /// Two anchors of one unit would share an update event name.
    #[error("anchors `{first}` and `{second}` in `{unit}` map to the same event name")]
    DuplicateAnchor {
        unit: String,
        first: String,
        second: String,
    },
}
