#![forbid(unsafe_code)]

use std::fmt;

use miette::{Diagnostic, LabeledSpan, SourceSpan};
use serde::Serialize;
use thiserror::Error;
use veritas_ast::Span;

/// Which family a reported problem belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Mismatch, unknown type, ambiguous inference, arity, return type.
    Type,
    /// Use-after-move, conflicting borrow.
    Ownership,
    /// Missing or incompatible effect annotation.
    Effect,
    /// Undefined variable, function, type or member.
    Name,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Type => "type",
            ErrorCategory::Ownership => "ownership",
            ErrorCategory::Effect => "effect",
            ErrorCategory::Name => "name",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, Serialize)]
#[error("{message}")]
pub struct TypeCheckError {
    pub message: String,
    pub category: ErrorCategory,
    pub span: Span,
}

impl TypeCheckError {
    pub fn new(category: ErrorCategory, message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            category,
            span,
        }
    }
}

impl Diagnostic for TypeCheckError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("veritas::typeck::{}", self.category)))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span: SourceSpan = (&self.span).into();
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(None, span))))
    }
}

#[derive(Clone, Debug, Error, Serialize)]
#[error("{message}")]
pub struct OwnershipError {
    pub message: String,
    pub span: Span,
    pub moved_at: Option<Span>,
    pub help: Option<String>,
}

impl Diagnostic for OwnershipError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("veritas::ownership"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let primary = LabeledSpan::new_with_span(None, SourceSpan::from(&self.span));
        let moved = self
            .moved_at
            .as_ref()
            .map(|span| LabeledSpan::new_with_span(Some("value moved here".to_string()), SourceSpan::from(span)));
        Some(Box::new(std::iter::once(primary).chain(moved)))
    }
}

impl OwnershipError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            moved_at: None,
            help: None,
        }
    }

    pub fn moved_at(mut self, span: Option<Span>) -> Self {
        self.moved_at = span;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Ownership
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_error_code_carries_category() {
        let err = TypeCheckError::new(ErrorCategory::Effect, "missing effect", Span::at(1, 1, 3));
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("veritas::typeck::effect"));
        assert_eq!(err.labels().map(|l| l.count()), Some(1));
    }

    #[test]
    fn ownership_error_labels_move_site() {
        let err = OwnershipError::new("use of moved value: `x`", Span::at(3, 5, 1))
            .moved_at(Some(Span::at(2, 9, 1)))
            .with_help("borrow with `&x` instead");
        assert_eq!(err.labels().map(|l| l.count()), Some(2));
        assert_eq!(err.help.as_deref(), Some("borrow with `&x` instead"));
        assert_eq!(err.category(), ErrorCategory::Ownership);
        let help = Diagnostic::help(&err).map(|h| h.to_string());
        assert_eq!(help.as_deref(), Some("borrow with `&x` instead"));
    }

    #[test]
    fn ownership_error_without_move_site_has_one_label() {
        let err = OwnershipError::new("cannot borrow `x` as mutable", Span::at(4, 1, 2));
        assert_eq!(err.labels().map(|l| l.count()), Some(1));
        assert!(Diagnostic::help(&err).is_none());
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("veritas::ownership"));
    }
}
