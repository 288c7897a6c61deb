//! Diagnostics channel
//!
//! Lexing, parsing, elaboration and late loading all report problems here
//! instead of failing. Each reported diagnostic is also logged.

use std::fmt;

use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Stage {
    Lex,
    Parse,
    Semantic,
    Backend,
}

/// One reported problem
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    /// Source path or other identifier of the definitions text
    pub source: Option<String>,
    pub span: Option<Span>,
    pub message: String,
    pub cause: Option<Box<Diagnostic>>,
}

impl Diagnostic {
    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            stage,
            source: None,
            span: None,
            message: message.into(),
            cause: None,
        }
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(stage, message)
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn caused_by(mut self, cause: Diagnostic) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, &self.span) {
            (Some(source), Some(span)) => write!(f, "{}:{}: ", source, span)?,
            (Some(source), None) => write!(f, "{}: ", source)?,
            (None, Some(span)) => write!(f, "{}: ", span)?,
            (None, None) => {}
        }
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}", severity, self.message)?;
        let mut cause = self.cause.as_deref();
        while let Some(inner) = cause {
            write!(f, "\n  caused by: {}", inner.message)?;
            if let Some(span) = inner.span {
                write!(f, " (at {})", span)?;
            }
            cause = inner.cause.as_deref();
        }
        Ok(())
    }
}

/// Ordered collection of diagnostics for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    source: Option<String>,
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics whose entries default to `source` as their origin.
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            items: Vec::new(),
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.source.is_none() {
            diagnostic.source = self.source.clone();
        }
        match diagnostic.severity {
            Severity::Error => tracing::warn!(stage = ?diagnostic.stage, "{}", diagnostic),
            Severity::Warning => tracing::debug!(stage = ?diagnostic.stage, "{}", diagnostic),
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        for diagnostic in other.items {
            self.push(diagnostic);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(diagnostic);
        diagnostics
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_cause() {
        let mut diagnostics = Diagnostics::for_source("units.def");
        diagnostics.push(
            Diagnostic::error(Stage::Semantic, "unit 'Knot' is invalid")
                .with_span(Span {
                    line: 3,
                    column: 6,
                    ..Span::default()
                })
                .caused_by(Diagnostic::error(Stage::Semantic, "unresolved reference 'Mile'")),
        );
        assert!(diagnostics.has_errors());
        assert_eq!(
            diagnostics.to_string(),
            "units.def:3:6: error: unit 'Knot' is invalid\n  caused by: unresolved reference 'Mile'"
        );
    }
}
