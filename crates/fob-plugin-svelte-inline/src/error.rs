//! Error types for inline sub-component extraction and compilation

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::runtime::RuntimeError;

/// Result type alias for plugin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort the transform of a single component.
///
/// Only the plugin's own structural errors live here. Compiler warnings are
/// reported through [`crate::diagnostics`] and never become an `Error`.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A `<template name="...">` block declared a name that is not a component name
    #[error("Invalid sub-component name '{name}' in {}", .file.display())]
    #[diagnostic(
        code(fob::svelte_inline::invalid_name),
        help("Sub-component names must start with an uppercase letter, contain only ASCII letters, digits or underscores, and must not contain '__'")
    )]
    InvalidSubComponentName { file: PathBuf, name: String },

    /// Two blocks in one file declared the same name and duplicates are rejected
    #[error("Sub-component '{name}' is declared more than once in {}", .file.display())]
    #[diagnostic(
        code(fob::svelte_inline::duplicate_name),
        help("Rename one of the blocks, or set `onDuplicate` to \"lastWins\"")
    )]
    DuplicateSubComponent { file: PathBuf, name: String },

    /// A start marker has no matching `</template>`
    #[error("Sub-component '{name}' in {} is never closed (opened at byte {offset})", .file.display())]
    #[diagnostic(
        code(fob::svelte_inline::unclosed_block),
        help("Add a closing </template> tag")
    )]
    UnclosedBlock {
        file: PathBuf,
        name: String,
        offset: usize,
    },

    /// The component is larger than the scanner accepts
    #[error("{} is too large: {size} bytes (max: {max} bytes)", .file.display())]
    #[diagnostic(code(fob::svelte_inline::source_too_large))]
    SourceTooLarge {
        file: PathBuf,
        size: usize,
        max: usize,
    },

    /// There is no place to inject sub-component imports
    #[error("Cannot inject sub-component imports into {}: malformed <script> tag", .file.display())]
    #[diagnostic(
        code(fob::svelte_inline::no_config_block),
        help("Check that every <script> opening tag is closed with '>'")
    )]
    NoConfigBlock { file: PathBuf },

    /// A sub-component artifact could not be written
    #[error("Failed to write sub-component artifact {}", .path.display())]
    #[diagnostic(
        code(fob::svelte_inline::artifact_write_failed),
        help("Check disk space and write permissions for the component's directory")
    )]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    /// A package.json was found but could not be read or parsed
    #[error("Failed to read package metadata {}: {reason}", .path.display())]
    #[diagnostic(code(fob::svelte_inline::package_metadata))]
    PackageMetadata { path: PathBuf, reason: String },

    /// The component compiler rejected the source
    #[error("Failed to compile {}: {message}", .file.display())]
    #[diagnostic(code(fob::svelte_inline::compile))]
    Compile { file: PathBuf, message: String },

    /// The preprocessor rejected the source
    #[error("Failed to preprocess {}: {message}", .file.display())]
    #[diagnostic(code(fob::svelte_inline::preprocess))]
    Preprocess { file: PathBuf, message: String },

    /// Plugin options could not be deserialized
    #[error("Invalid plugin options: {0}")]
    #[diagnostic(
        code(fob::svelte_inline::invalid_options),
        help("Check the option names and value types in your configuration")
    )]
    InvalidOptions(String),
}

impl Error {
    pub fn invalid_name(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::InvalidSubComponentName {
            file: file.into(),
            name: name.into(),
        }
    }

    pub fn duplicate(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::DuplicateSubComponent {
            file: file.into(),
            name: name.into(),
        }
    }

    pub fn artifact_write_failed(path: impl Into<PathBuf>, source: RuntimeError) -> Self {
        Self::ArtifactWriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was raised by name validation or duplicate detection.
    pub fn is_naming_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSubComponentName { .. } | Self::DuplicateSubComponent { .. }
        )
    }
}
