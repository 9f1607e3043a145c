//! Error types.
//!
//! Validation failures are data ([`ValidationError`], carried by
//! `Make::Error`). [`Error`] is for everything else: schema-building mistakes,
//! configuration problems and traversal failures.

use std::fmt;

use thiserror::Error;

/// Result type for crate operations that are not validations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("format already registered: {0}")]
    DuplicateFormat(String),

    #[error("invalid pattern /{pattern}/: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("named type already defined: {0}")]
    AlreadyDefined(String),

    #[error("invalid options at {path}: {message}")]
    InvalidOptions { path: String, message: String },

    #[error("cannot traverse from {root} to {leaf}: ambiguous path at {path}")]
    AmbiguousTraversal { root: String, leaf: String, path: String },

    #[error("cannot traverse from {root} to {leaf}: leaf is unreachable")]
    UnreachableLeaf { root: String, leaf: String },

    #[error("value is not a {root}")]
    RootMismatch { root: String },

    #[error("transform failed: {0}")]
    Transform(#[source] anyhow::Error),

    #[error("transform task panicked: {0}")]
    TransformPanicked(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------- Validation errors --------------------------- //

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Outermost segment first; array indices are rendered `[n]`.
    pub path: Vec<String>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    Message(String),
    Group(ErrorGroup),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorGroup {
    pub group_message: String,
    pub errors: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { path: Vec::new(), error: ErrorDetail::Message(message.into()) }
    }

    pub fn group(message: impl Into<String>, errors: Vec<ValidationError>) -> Self {
        Self {
            path: Vec::new(),
            error: ErrorDetail::Group(ErrorGroup { group_message: message.into(), errors }),
        }
    }

    /// Prepends a path segment.
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        self.path.insert(0, segment.into());
        self
    }

    /// The message, or the group message for a group.
    pub fn message(&self) -> &str {
        match &self.error {
            ErrorDetail::Message(m) => m,
            ErrorDetail::Group(g) => &g.group_message,
        }
    }

    pub fn children(&self) -> &[ValidationError] {
        match &self.error {
            ErrorDetail::Message(_) => &[],
            ErrorDetail::Group(g) => &g.errors,
        }
    }

    /// `a.b[0].c`
    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }

    fn write_lines(&self, depth: usize, bullet: bool, out: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let bullet = if bullet { "- " } else { "" };
        let head = if self.path.is_empty() {
            String::new()
        } else {
            format!("{}: ", self.path_string())
        };
        match &self.error {
            ErrorDetail::Message(m) => out.push(format!("{indent}{bullet}{head}{m}")),
            ErrorDetail::Group(g) => match g.errors.as_slice() {
                // single plain child: keep it on one line
                [only] if only.children().is_empty() => {
                    let inner = if only.path.is_empty() {
                        only.message().to_string()
                    } else {
                        format!("{}: {}", only.path_string(), only.message())
                    };
                    out.push(format!("{indent}{bullet}{head}{}: {inner}", g.group_message));
                }
                children => {
                    out.push(format!("{indent}{bullet}{head}{}", g.group_message));
                    for child in children {
                        child.write_lines(depth + 1, true, out);
                    }
                }
            },
        }
    }
}

pub(crate) fn render_path(path: &[String]) -> String {
    let mut out = String::new();
    for seg in path {
        if !out.is_empty() && !seg.starts_with('[') {
            out.push('.');
        }
        out.push_str(seg);
    }
    out
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        self.write_lines(0, false, &mut lines);
        f.write_str(&lines.join("\n"))
    }
}

/// Aggregate raised by `Make::into_result` when a success value was demanded
/// from a failed validation.
#[derive(Error, Debug, Clone)]
#[error("validation failed:\n{}", render_all(.errors))]
pub struct ValidationFailure {
    pub errors: Vec<ValidationError>,
}

fn render_all(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
}
