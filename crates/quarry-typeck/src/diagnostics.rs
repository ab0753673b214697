//! Ariadne-based rendering of inference diagnostics.
//!
//! Diagnostics are placed using the text range of the node they are
//! attached to. JSON mode emits one machine-readable object per diagnostic
//! instead of a formatted report.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde::Serialize;

use quarry_hir::{Body, ItemTree};

use crate::error::InferenceDiagnostic;

/// Rendering options.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    /// Plain text without ANSI escapes, for tests and log files.
    pub fn colorless() -> Self {
        DiagnosticOptions { color: false, json: false }
    }

    pub fn json_mode() -> Self {
        DiagnosticOptions { color: false, json: true }
    }
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    code: &'a str,
    message: String,
    start: usize,
    end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual: Option<String>,
}

// ── Span Helpers ───────────────────────────────────────────────────────

fn text_range_to_range(range: rowan::TextRange) -> Range<usize> {
    let start: usize = range.start().into();
    let end: usize = range.end().into();
    start..end
}

/// Keep a span inside the source and at least one character wide.
fn clamp(range: Range<usize>, source_len: usize) -> Range<usize> {
    let start = range.start.min(source_len);
    let end = range.end.min(source_len).max(start);
    if start == end {
        start..end.saturating_add(1).min(source_len)
    } else {
        start..end
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

pub fn render_diagnostic(
    diag: &InferenceDiagnostic,
    items: &ItemTree,
    body: &Body,
    source: &str,
    options: &DiagnosticOptions,
) -> String {
    let span = clamp(text_range_to_range(body.range(diag.site())), source.len());
    if options.json {
        return render_json(diag, items, span);
    }

    let label = match diag {
        InferenceDiagnostic::TypeMismatch { expected, .. } => {
            format!("expected `{}` because of this slot", expected.display(items))
        }
        InferenceDiagnostic::CannotDeref { ty, .. } => {
            format!("`{}` is not a pointer", ty.display(items))
        }
    };
    let report = Report::build(ReportKind::Error, span.clone())
        .with_code(diag.code())
        .with_message(diag.message(items))
        .with_config(Config::default().with_color(options.color))
        .with_label(Label::new(span).with_message(label).with_color(Color::Red))
        .finish();

    let mut buf = Vec::new();
    if let Err(err) = report.write(Source::from(source), &mut buf) {
        tracing::debug!(%err, "failed to render diagnostic");
        return diag.message(items);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn render_json(diag: &InferenceDiagnostic, items: &ItemTree, span: Range<usize>) -> String {
    let (expected, actual) = match diag {
        InferenceDiagnostic::TypeMismatch { expected, actual, .. } => {
            (Some(expected.display(items).to_string()), Some(actual.display(items).to_string()))
        }
        InferenceDiagnostic::CannotDeref { ty, .. } => (None, Some(ty.display(items).to_string())),
    };
    let json = JsonDiagnostic {
        code: diag.code(),
        message: diag.message(items),
        start: span.start,
        end: span.end,
        expected,
        actual,
    };
    serde_json::to_string(&json).unwrap_or_else(|_| diag.message(items))
}
