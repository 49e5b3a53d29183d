#![forbid(unsafe_code)]

use std::fmt;

use miette::SourceSpan;
use serde::{Deserialize, Serialize};

/// A point in source text: 1-based line and column, 0-based byte offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub offset: usize,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self {
            file: None,
            start,
            end,
        }
    }

    /// Span for synthesized nodes that have no source text.
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Single-line span at `line:column`, `len` columns wide.
    pub fn at(line: u32, column: u32, len: u32) -> Self {
        Self::new(
            Position::new(line, column, 0),
            Position::new(line, column + len, 0),
        )
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn is_dummy(&self) -> bool {
        self.start.line == 0 && self.end.line == 0
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Span {
        let start = if (self.start.line, self.start.column) <= (other.start.line, other.start.column) {
            self.start
        } else {
            other.start
        };
        let end = if (self.end.line, self.end.column) >= (other.end.line, other.end.column) {
            self.end
        } else {
            other.end
        };
        Span {
            file: self.file.clone().or_else(|| other.file.clone()),
            start,
            end,
        }
    }

    /// Does `self` start at or before `other` starts?
    pub fn precedes(&self, other: &Span) -> bool {
        (self.start.line, self.start.column) <= (other.start.line, other.start.column)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}", self.start),
            None => write!(f, "{}", self.start),
        }
    }
}

impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.offset.into(), span.end.offset.saturating_sub(span.start.offset))
    }
}

impl From<&Span> for SourceSpan {
    fn from(span: &Span) -> Self {
        span.clone().into()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(span: Span, node: T) -> Self {
        Self { span, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            span: self.span,
            node: f(self.node),
        }
    }
}
