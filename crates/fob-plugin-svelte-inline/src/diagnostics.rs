//! Compiler diagnostics: filtering and forwarding
//!
//! Diagnostics reported by the component compiler are never fatal. Each one is
//! either dropped (unused-selector warnings when stylesheets are injected by
//! the compiler) or forwarded to the user's `on_warn` handler, falling back to
//! [`default_report`] which emits a `tracing` event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Warning codes the compiler uses for selectors that match nothing.
///
/// Both the hyphenated and the underscored spelling are in use across
/// compiler versions.
pub const UNUSED_SELECTOR_CODES: &[&str] = &["css-unused-selector", "css_unused_selector"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A location in the compiled source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub column: u32,
    /// Byte offset into the source
    #[serde(default)]
    pub character: u32,
}

/// One compiler-reported issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Position>,
    /// Code frame around `start`, if the compiler produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

impl Diagnostic {
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            filename: None,
            start: None,
            end: None,
            frame: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(code, message)
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_span(mut self, start: Position, end: Position) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    pub fn is_unused_selector(&self) -> bool {
        UNUSED_SELECTOR_CODES.contains(&self.code.as_str())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(filename) = &self.filename {
            write!(f, "{}", filename)?;
            if let Some(start) = &self.start {
                write!(f, ":{}:{}", start.line, start.column)?;
            }
            write!(f, " ")?;
        }
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// User override for diagnostic reporting.
///
/// The handler receives every forwarded diagnostic together with the default
/// reporter, so it can delegate the ones it does not care about.
pub trait WarningHandler: Send + Sync {
    fn handle(&self, diagnostic: &Diagnostic, fallback: &dyn Fn(&Diagnostic));
}

impl<F> WarningHandler for F
where
    F: Fn(&Diagnostic, &dyn Fn(&Diagnostic)) + Send + Sync,
{
    fn handle(&self, diagnostic: &Diagnostic, fallback: &dyn Fn(&Diagnostic)) {
        self(diagnostic, fallback)
    }
}

/// Default reporter: one `tracing` event per diagnostic.
pub fn default_report(diagnostic: &Diagnostic) {
    let filename = diagnostic.filename.as_deref().unwrap_or("<unknown>");
    match diagnostic.severity {
        Severity::Warning => tracing::warn!(
            code = %diagnostic.code,
            file = %filename,
            "{}",
            diagnostic.message
        ),
        Severity::Error => tracing::error!(
            code = %diagnostic.code,
            file = %filename,
            "{}",
            diagnostic.message
        ),
    }

    if let Some(frame) = &diagnostic.frame {
        tracing::debug!(file = %filename, "\n{}", frame);
    }
}

/// Applies the filtering policy and routes diagnostics to their handler.
#[derive(Clone)]
pub struct DiagnosticReporter {
    emit_css: bool,
    handler: Option<Arc<dyn WarningHandler>>,
}

impl DiagnosticReporter {
    pub fn new(emit_css: bool, handler: Option<Arc<dyn WarningHandler>>) -> Self {
        Self { emit_css, handler }
    }

    /// Unused-selector warnings are only meaningful when the stylesheet is
    /// emitted separately; with injected CSS they are dropped.
    pub fn should_forward(&self, diagnostic: &Diagnostic) -> bool {
        self.emit_css || !diagnostic.is_unused_selector()
    }

    /// Report every diagnostic that passes the filter. Returns how many were
    /// forwarded.
    pub fn report_all(&self, diagnostics: &[Diagnostic]) -> usize {
        let mut forwarded = 0;
        for diagnostic in diagnostics.iter().filter(|d| self.should_forward(d)) {
            match &self.handler {
                Some(handler) => handler.handle(diagnostic, &default_report),
                None => default_report(diagnostic),
            }
            forwarded += 1;
        }
        forwarded
    }
}

impl fmt::Debug for DiagnosticReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticReporter")
            .field("emit_css", &self.emit_css)
            .field("handler", &self.handler.as_ref().map(|_| "<handler>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collecting() -> (Arc<Mutex<Vec<String>>>, Arc<dyn WarningHandler>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |d: &Diagnostic, _fallback: &dyn Fn(&Diagnostic)| {
            sink.lock().push(d.code.clone());
        };
        (seen, Arc::new(handler))
    }

    #[test]
    fn test_unused_selector_codes() {
        assert!(Diagnostic::warning("css-unused-selector", "x").is_unused_selector());
        assert!(Diagnostic::warning("css_unused_selector", "x").is_unused_selector());
        assert!(!Diagnostic::warning("a11y-missing-attribute", "x").is_unused_selector());
    }

    #[test]
    fn test_unused_selector_dropped_without_emit_css() {
        let (seen, handler) = collecting();
        let reporter = DiagnosticReporter::new(false, Some(handler));

        let forwarded = reporter.report_all(&[
            Diagnostic::warning("css-unused-selector", "Unused CSS selector \".x\""),
            Diagnostic::warning("a11y-missing-attribute", "<img> needs alt"),
        ]);

        assert_eq!(forwarded, 1);
        assert_eq!(*seen.lock(), vec!["a11y-missing-attribute".to_string()]);
    }

    #[test]
    fn test_unused_selector_kept_with_emit_css() {
        let (seen, handler) = collecting();
        let reporter = DiagnosticReporter::new(true, Some(handler));

        reporter.report_all(&[Diagnostic::warning("css_unused_selector", "unused")]);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_handler_can_delegate_to_fallback() {
        let delegated = Arc::new(Mutex::new(0usize));
        let counter = delegated.clone();
        let handler = move |d: &Diagnostic, fallback: &dyn Fn(&Diagnostic)| {
            *counter.lock() += 1;
            fallback(d);
        };
        let reporter = DiagnosticReporter::new(true, Some(Arc::new(handler)));

        reporter.report_all(&[Diagnostic::error("parse-error", "bad")]);
        assert_eq!(*delegated.lock(), 1);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::warning("a11y-missing-attribute", "<img> needs alt")
            .with_filename("/src/App.svelte")
            .with_span(
                Position {
                    line: 3,
                    column: 4,
                    character: 40,
                },
                Position {
                    line: 3,
                    column: 20,
                    character: 56,
                },
            );
        assert_eq!(
            d.to_string(),
            "/src/App.svelte:3:4 <img> needs alt (a11y-missing-attribute)"
        );
    }

    #[test]
    fn test_deserialize_from_compiler_json() {
        let json = serde_json::json!({
            "severity": "warning",
            "code": "css-unused-selector",
            "message": "Unused CSS selector",
            "filename": "Button.svelte",
            "start": { "line": 1, "column": 2, "character": 3 }
        });
        let d: Diagnostic = serde_json::from_value(json).unwrap();
        assert!(d.is_unused_selector());
        assert_eq!(d.start.map(|p| p.line), Some(1));
        assert!(d.end.is_none());
    }
}
