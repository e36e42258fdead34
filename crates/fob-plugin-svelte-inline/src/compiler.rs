//! Boundary with the external component compiler and preprocessor
//!
//! The compiler is a black box: it receives the rewritten component text and
//! a set of options, and returns JavaScript, an optional stylesheet and a list
//! of diagnostics. Hosts plug in their compiler by implementing
//! [`ComponentCompiler`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagnostics::Diagnostic;

/// Output format forced on every compile.
pub const OUTPUT_FORMAT: &str = "esm";

/// Options the plugin controls itself; user values for them are discarded.
const FORCED_OPTIONS: &[&str] = &["filename", "format", "css"];

/// How the compiler should handle component styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssMode {
    /// Return the stylesheet separately so it can be emitted as an asset
    #[default]
    External,
    /// Inject styles at runtime from the compiled JavaScript
    Injected,
}

impl CssMode {
    pub fn for_emit_css(emit_css: bool) -> Self {
        if emit_css {
            Self::External
        } else {
            Self::Injected
        }
    }
}

/// Options passed to [`ComponentCompiler::compile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub filename: String,
    pub format: String,
    pub css: CssMode,
    /// User `compilerOptions`, minus the keys above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompileOptions {
    /// Merge user compiler options with the values the plugin forces.
    pub fn new(filename: impl Into<String>, user: &Map<String, Value>, emit_css: bool) -> Self {
        let extra = user
            .iter()
            .filter(|(key, _)| !FORCED_OPTIONS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            filename: filename.into(),
            format: OUTPUT_FORMAT.to_string(),
            css: CssMode::for_emit_css(emit_css),
            extra,
        }
    }

    /// Flat JSON object, as a JavaScript compiler expects it.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Compiled component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOutput {
    pub js: String,
    /// Source map as JSON text
    pub map: Option<String>,
    pub css: Option<String>,
    pub warnings: Vec<Diagnostic>,
    /// Extra files the compiled output depends on
    pub dependencies: Vec<String>,
}

impl CompileOutput {
    pub fn new(js: impl Into<String>) -> Self {
        Self {
            js: js.into(),
            ..Default::default()
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }

    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }

    pub fn with_warning(mut self, warning: Diagnostic) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// The stylesheet, if the compiler produced a non-blank one.
    pub fn stylesheet(&self) -> Option<&str> {
        self.css.as_deref().filter(|css| !css.trim().is_empty())
    }
}

/// The component compiler.
#[async_trait]
pub trait ComponentCompiler: Send + Sync + std::fmt::Debug {
    async fn compile(&self, source: &str, options: &CompileOptions)
    -> anyhow::Result<CompileOutput>;
}

/// Result of preprocessing a component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    pub code: String,
    pub dependencies: Vec<String>,
}

/// Source-to-source step that runs before extraction.
#[async_trait]
pub trait Preprocessor: Send + Sync + std::fmt::Debug {
    async fn preprocess(&self, source: &str, filename: &str) -> anyhow::Result<Preprocessed>;
}
