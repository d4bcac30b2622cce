use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`crate::Page`] implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("unsupported selector: {0}")]
    Selector(String),
    #[error("stale element handle {0}")]
    StaleElement(usize),
    #[error("markup error: {0}")]
    Markup(String),
    #[error("page is closed")]
    Closed,
}

/// Failures raised while executing a single action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Element not found: {0}")]
    TargetNotFound(String),
    #[error("action '{action}' is not available in {kind} suites")]
    Unsupported { action: &'static str, kind: String },
    #[error("action '{action}' timed out after {}ms", .after.as_millis())]
    Timeout {
        action: &'static str,
        after: Duration,
    },
    #[error(transparent)]
    Page(#[from] PageError),
}

impl ActionError {
    /// Errors that mean the run itself is broken, not the step under test.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Page(PageError::Closed))
    }
}

/// Errors escaping the scenario runner. The suite runner records them and
/// keeps going.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarnessError {
    #[error("page under test closed during '{step}'")]
    PageClosed { step: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEof(&'static str),
    #[error("invalid directive on line {line}: {text}")]
    InvalidDirective { line: usize, text: String },
    #[error("invalid syntax on line {line}: {text}")]
    InvalidSyntax { line: usize, text: String },
    #[error("unknown action '{action}' on line {line}")]
    UnknownAction { line: usize, action: String },
    #[error("missing {what} on line {line}")]
    MissingValue { line: usize, what: &'static str },
}

/// Errors while reading a suite definition from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
