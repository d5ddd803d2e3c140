pub mod ansi;
pub mod json;
pub mod registry;

use crate::config::ConfigError;
use crate::loader::{LoadError, Span};
use crate::vm::VmError;

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// An error report. The first label is the one rendered under the source snippet.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into() });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- From impls for error types ----

impl From<&LoadError> for Diagnostic {
    fn from(e: &LoadError) -> Self {
        let message = match e.kind {
            crate::loader::LoadErrorKind::UnexpectedCharacter => {
                format!("unexpected token '{}'", e.snippet)
            }
            crate::loader::LoadErrorKind::OutOfRange => {
                format!("word '{}' does not fit in 64 bits", e.snippet)
            }
            crate::loader::LoadErrorKind::TooLarge => "program image too large".to_string(),
        };
        Diagnostic::error(message)
            .with_code(e.kind.code())
            .with_span(e.span, "here")
            .with_suggestion(e.suggestion.clone())
    }
}

impl From<&VmError> for Diagnostic {
    fn from(e: &VmError) -> Self {
        let mut d = Diagnostic::error(e.to_string()).with_code(e.code());
        if let Some(source) = std::error::Error::source(e) {
            d = d.with_note(format!("caused by: {source}"));
        }
        if e.is_fatal() {
            d = d.with_note("the execution context cannot be used further");
        }
        d
    }
}

impl From<&ConfigError> for Diagnostic {
    fn from(e: &ConfigError) -> Self {
        Diagnostic::error(e.to_string()).with_code("AVM-C001")
    }
}
