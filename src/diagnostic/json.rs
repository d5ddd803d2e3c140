//! Machine-readable diagnostics: one JSON object per line on stderr.

use serde::Serialize;

use super::Diagnostic;
use crate::loader::SourceMap;

#[derive(Serialize)]
struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: &'a str,
    labels: Vec<Position<'a>>,
    notes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

/// A label, with 1-based line and column when the source text is attached.
#[derive(Serialize)]
struct Position<'a> {
    start: usize,
    end: usize,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    col: Option<usize>,
}

impl<'a> Report<'a> {
    fn new(d: &'a Diagnostic) -> Self {
        let map = d.source.as_deref().map(SourceMap::new);
        let labels = d
            .labels
            .iter()
            .map(|l| {
                let at = map.as_ref().map(|m| m.lookup(l.span.start));
                Position {
                    start: l.span.start,
                    end: l.span.end,
                    message: &l.message,
                    line: at.map(|(line, _)| line),
                    col: at.map(|(_, col)| col),
                }
            })
            .collect();
        Report {
            code: d.code,
            message: &d.message,
            labels,
            notes: &d.notes,
            suggestion: d.suggestion.as_deref(),
        }
    }
}

pub fn render(d: &Diagnostic) -> String {
    serde_json::to_string(&Report::new(d))
        .unwrap_or_else(|_| r#"{"message":"cannot serialize diagnostic"}"#.to_string())
}
