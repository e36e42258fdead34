//! Plugin options
//!
//! Options are plain serde data so they can come straight from a JSON or JS
//! config object. The two callback-style options (`on_warn`, `preprocess`) are
//! trait objects and can only be set programmatically.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::compiler::Preprocessor;
use crate::diagnostics::WarningHandler;
use crate::error::{Error, Result};

/// Top-level option names the plugin understands.
pub const KNOWN_OPTIONS: &[&str] = &[
    "compilerOptions",
    "include",
    "exclude",
    "extensions",
    "emitCss",
    "onDuplicate",
    "onwarn",
    "preprocess",
];

/// What to do when one component declares the same sub-component twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    /// The later block replaces the earlier one
    #[default]
    LastWins,
    /// Fail the transform
    Error,
}

/// Configuration for [`crate::FobSvelteInlinePlugin`]
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SvelteInlineOptions {
    /// Forwarded to the compiler; `format` and `css` are overridden
    pub compiler_options: Map<String, Value>,

    /// Only transform ids containing one of these substrings
    pub include: Vec<String>,

    /// Never transform ids containing one of these substrings
    pub exclude: Vec<String>,

    /// Claimed file extensions, with the leading dot
    pub extensions: Vec<String>,

    /// Split component styles into virtual `.css` assets
    pub emit_css: bool,

    pub on_duplicate: DuplicatePolicy,

    #[serde(skip)]
    pub on_warn: Option<Arc<dyn WarningHandler>>,

    #[serde(skip)]
    pub preprocess: Option<Arc<dyn Preprocessor>>,
}

impl Default for SvelteInlineOptions {
    fn default() -> Self {
        Self {
            compiler_options: Map::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            extensions: vec![".svelte".to_string()],
            emit_css: true,
            on_duplicate: DuplicatePolicy::default(),
            on_warn: None,
            preprocess: None,
        }
    }
}

impl fmt::Debug for SvelteInlineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SvelteInlineOptions")
            .field("compiler_options", &self.compiler_options)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("extensions", &self.extensions)
            .field("emit_css", &self.emit_css)
            .field("on_duplicate", &self.on_duplicate)
            .field("on_warn", &self.on_warn.is_some())
            .field("preprocess", &self.preprocess)
            .finish()
    }
}

impl SvelteInlineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize options from a config object.
    ///
    /// Unrecognized top-level keys are not an error; each one is reported
    /// with a warning and otherwise ignored.
    pub fn from_json(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::InvalidOptions(format!(
                "expected an object, found {}",
                value
            )));
        }

        for key in unrecognized_options(value) {
            tracing::warn!(
                option = %key,
                "Unrecognized option '{}' for fob-svelte-inline, ignoring it",
                key
            );
        }

        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidOptions(e.to_string()))
    }

    /// Set a single compiler option
    pub fn with_compiler_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.compiler_options.insert(key.into(), value);
        self
    }

    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Replace the claimed extensions
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_emit_css(mut self, enabled: bool) -> Self {
        self.emit_css = enabled;
        self
    }

    pub fn with_on_duplicate(mut self, policy: DuplicatePolicy) -> Self {
        self.on_duplicate = policy;
        self
    }

    pub fn with_on_warn(mut self, handler: Arc<dyn WarningHandler>) -> Self {
        self.on_warn = Some(handler);
        self
    }

    pub fn with_preprocess(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.preprocess = Some(preprocessor);
        self
    }

    /// Whether `id` ends with one of the claimed extensions.
    pub fn claims(&self, id: &str) -> bool {
        self.extensions.iter().any(|ext| id.ends_with(ext.as_str()))
    }

    /// Extension filter plus include/exclude patterns.
    pub fn should_transform(&self, id: &str) -> bool {
        if !self.claims(id) {
            return false;
        }

        if self
            .exclude
            .iter()
            .any(|pattern| id.contains(pattern.as_str()))
        {
            return false;
        }

        if !self.include.is_empty() {
            return self
                .include
                .iter()
                .any(|pattern| id.contains(pattern.as_str()));
        }

        true
    }
}

/// Top-level keys of `value` that are not in [`KNOWN_OPTIONS`], sorted.
pub fn unrecognized_options(value: &Value) -> Vec<String> {
    let mut unknown: Vec<String> = value
        .as_object()
        .map(|object| {
            object
                .keys()
                .filter(|key| !KNOWN_OPTIONS.contains(&key.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    unknown.sort();
    unknown
}
