//! Rolldown plugin for Svelte components with inline sub-components
//!
//! A component may declare small child components right inside its own file:
//!
//! ```svelte
//! <script>
//!   let href = '/';
//! </script>
//!
//! <NavLink {href}>Home</NavLink>
//!
//! <template name="NavLink">
//!   <script>export let href;</script>
//!   <a {href}><slot /></a>
//! </template>
//! ```
//!
//! Each `<template name="...">` block is moved into a sibling file named
//! `App__NavLink.svelte`, the parent gets `import NavLink from './App__NavLink.svelte';`
//! and the result goes to the Svelte compiler. The sibling file only exists
//! while the bundler needs it: it is deleted once parsed and written again at
//! the start of the next build.
//!
//! ## Architecture
//!
//! ```text
//! .svelte ─► transform ─► extractor ─► ArtifactStore (sibling files)
//!                 │
//!                 ├─► rewriter (import injection)
//!                 ├─► ComponentCompiler (JS + CSS + warnings)
//!                 └─► VirtualAssets ("Button.css") ─► resolve_id / load
//! ```
//!
//! The Svelte compiler itself is not part of this crate. Hosts provide it
//! through [`ComponentCompiler`], and optionally a [`Preprocessor`].
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use fob_plugin_svelte_inline::{FobSvelteInlinePlugin, SvelteInlineOptions};
//! use std::sync::Arc;
//!
//! let options = SvelteInlineOptions::new()
//!     .with_exclude("node_modules")
//!     .with_emit_css(true);
//! let plugin = Arc::new(FobSvelteInlinePlugin::with_options(options, Arc::new(MyCompiler)));
//! // Add to your Rolldown bundler configuration
//! ```

pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extractor;
#[cfg(feature = "logging")]
pub mod logging;
pub mod naming;
pub mod package_json;
pub mod pipeline;
pub mod plugin;
pub mod resolver;
pub mod rewriter;
pub mod runtime;
pub mod session;
pub mod store;

pub use compiler::{
    CompileOptions, CompileOutput, ComponentCompiler, CssMode, Preprocessed, Preprocessor,
};
pub use config::{DuplicatePolicy, SvelteInlineOptions};
pub use diagnostics::{Diagnostic, Position, Severity, WarningHandler};
pub use error::{Error, Result};
pub use extractor::{Extraction, SubComponentRecord};
pub use pipeline::{SourceUnit, Stage, SvelteInlinePipeline, TransformOutput};
pub use plugin::FobSvelteInlinePlugin;
pub use resolver::Resolution;
pub use runtime::{MemoryRuntime, Runtime, RuntimeError};
pub use session::BuildSession;
pub use store::{ArtifactStore, VirtualAssets};

#[cfg(not(target_family = "wasm"))]
pub use runtime::NativeRuntime;
