//! Run failures
//!
//! Every failure aborts the whole run. Each variant carries the 1-indexed
//! source line that was being processed when it was detected.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// An unclosed block or snippet
    #[error("missing {terminator} for {construct}")]
    MissingTerminator {
        construct: String,
        terminator: &'static str,
        line: usize,
    },

    /// Snippet fence out of order
    #[error("expected {expected} after snippet header, found `{found}`")]
    MalformedHeader {
        expected: &'static str,
        found: String,
        line: usize,
    },

    /// A snippet whose language was not enabled by a directive
    #[error("{header} used but {language} is not enabled")]
    DelegationDisabled {
        header: &'static str,
        language: &'static str,
        line: usize,
    },

    #[error("invalid expression `{expr}`: {reason}")]
    InvalidExpression {
        expr: String,
        reason: String,
        line: usize,
    },

    #[error("unknown command: {statement}")]
    UnknownStatement { statement: String, line: usize },

    #[error("malformed `{command}` statement: expected {expected}")]
    MalformedStatement {
        command: &'static str,
        expected: &'static str,
        line: usize,
    },

    #[error("{message}")]
    TypeMismatch { message: String, line: usize },

    #[error("index {index} out of range for `{table}` of length {len}")]
    IndexOutOfRange {
        table: String,
        index: i64,
        len: usize,
        line: usize,
    },

    #[error("{table} does not contain {value}")]
    ValueNotFound {
        table: String,
        value: String,
        line: usize,
    },

    #[error("{message}")]
    Arithmetic { message: String, line: usize },
}

impl ScriptError {
    /// The 1-indexed source line active when the failure was detected
    pub fn line(&self) -> usize {
        match self {
            ScriptError::MissingTerminator { line, .. }
            | ScriptError::MalformedHeader { line, .. }
            | ScriptError::DelegationDisabled { line, .. }
            | ScriptError::InvalidExpression { line, .. }
            | ScriptError::UnknownStatement { line, .. }
            | ScriptError::MalformedStatement { line, .. }
            | ScriptError::TypeMismatch { line, .. }
            | ScriptError::IndexOutOfRange { line, .. }
            | ScriptError::ValueNotFound { line, .. }
            | ScriptError::Arithmetic { line, .. } => *line,
        }
    }
}
