//! Transform pipeline
//!
//! ```text
//! code ─► preprocess ─► extract ─► publish artifacts ─► rewrite imports
//!                                                           │
//!       ◄── append `import "X.css"` ◄── report diagnostics ◄┴─ compile
//! ```
//!
//! Each component moves through [`Stage`]s strictly in order. Different
//! components may be transformed concurrently; they only share the
//! [`BuildSession`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{trace, warn};

use crate::compiler::{CompileOptions, ComponentCompiler};
use crate::config::SvelteInlineOptions;
use crate::diagnostics::{Diagnostic, DiagnosticReporter};
use crate::error::{Error, Result};
use crate::resolver::{BareImportResolver, Resolution, inaccessible_packages_warning};
use crate::runtime::Runtime;
use crate::session::BuildSession;
use crate::{extractor, naming, rewriter};

/// Where a component is in its transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Extracting,
    Rewriting,
    Compiling,
    Emitting,
    Done,
    Aborted,
}

impl Stage {
    /// The only stage that may follow this one on success.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::Extracting),
            Stage::Extracting => Some(Stage::Rewriting),
            Stage::Rewriting => Some(Stage::Compiling),
            Stage::Compiling => Some(Stage::Emitting),
            Stage::Emitting => Some(Stage::Done),
            Stage::Done | Stage::Aborted => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Aborted)
    }

    fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Extracting => "extracting",
            Stage::Rewriting => "rewriting",
            Stage::Compiling => "compiling",
            Stage::Emitting => "emitting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of one component's transform, with transitions logged at `trace`.
#[derive(Debug)]
struct StageTracker<'a> {
    id: &'a str,
    stage: Stage,
}

impl<'a> StageTracker<'a> {
    fn new(id: &'a str) -> Self {
        Self {
            id,
            stage: Stage::Idle,
        }
    }

    fn advance(&mut self, to: Stage) {
        debug_assert_eq!(self.stage.next(), Some(to), "out-of-order stage transition");
        trace!(id = self.id, from = %self.stage, to = %to, "Stage transition");
        self.stage = to;
    }

    fn abort(&mut self) {
        trace!(id = self.id, from = %self.stage, "Transform aborted");
        self.stage = Stage::Aborted;
    }
}

/// One component handed to [`SvelteInlinePipeline::transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub text: String,
    /// Extension with the leading dot, or empty
    pub extension: String,
}

impl SourceUnit {
    pub fn new(id: &str, text: impl Into<String>) -> Self {
        let path = PathBuf::from(id);
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        Self {
            path,
            text: text.into(),
            extension,
        }
    }
}

/// Result of a successful transform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    /// Source map as JSON text, as produced by the compiler
    pub map: Option<String>,
    /// Files the bundler should watch in addition to the component
    pub dependencies: Vec<String>,
}

/// The plugin's behavior, independent of the bundler's hook types.
#[derive(Debug, Clone)]
pub struct SvelteInlinePipeline {
    options: Arc<SvelteInlineOptions>,
    compiler: Arc<dyn ComponentCompiler>,
    session: BuildSession,
    resolver: BareImportResolver,
    reporter: DiagnosticReporter,
}

impl SvelteInlinePipeline {
    pub fn new(
        options: SvelteInlineOptions,
        compiler: Arc<dyn ComponentCompiler>,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self::with_session(options, compiler, BuildSession::new(runtime))
    }

    pub fn with_session(
        options: SvelteInlineOptions,
        compiler: Arc<dyn ComponentCompiler>,
        session: BuildSession,
    ) -> Self {
        let reporter = DiagnosticReporter::new(options.emit_css, options.on_warn.clone());
        Self {
            options: Arc::new(options),
            compiler,
            resolver: BareImportResolver::new(session.clone()),
            session,
            reporter,
        }
    }

    pub fn options(&self) -> &SvelteInlineOptions {
        &self.options
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Transform one component. Returns `Ok(None)` for ids the plugin does
    /// not claim.
    pub async fn transform(&self, code: &str, id: &str) -> Result<Option<TransformOutput>> {
        if !self.options.should_transform(id) {
            return Ok(None);
        }

        let unit = SourceUnit::new(id, code);
        let mut stage = StageTracker::new(id);

        match self.run(&unit, id, &mut stage).await {
            Ok(output) => {
                stage.advance(Stage::Done);
                Ok(Some(output))
            }
            Err(error) => {
                stage.abort();
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        unit: &SourceUnit,
        id: &str,
        stage: &mut StageTracker<'_>,
    ) -> Result<TransformOutput> {
        let mut dependencies = Vec::new();

        let source = match &self.options.preprocess {
            Some(preprocessor) => {
                let preprocessed = preprocessor
                    .preprocess(&unit.text, id)
                    .await
                    .map_err(|e| Error::Preprocess {
                        file: unit.path.clone(),
                        message: format!("{e:#}"),
                    })?;
                dependencies.extend(preprocessed.dependencies);
                preprocessed.code
            }
            None => unit.text.clone(),
        };

        stage.advance(Stage::Extracting);
        let extraction = extractor::extract(&source, &unit.path, self.options.on_duplicate)?;
        for record in &extraction.records {
            self.session.artifacts().publish(record.clone()).await?;
        }
        self.session
            .artifacts()
            .retain_for_parent(&unit.path, &extraction.records)
            .await;

        stage.advance(Stage::Rewriting);
        let rewritten =
            rewriter::inject_imports(&extraction.residual, &unit.path, &extraction.imports())?;

        stage.advance(Stage::Compiling);
        let compile_options =
            CompileOptions::new(id, &self.options.compiler_options, self.options.emit_css);
        let compiled = self
            .compiler
            .compile(&rewritten, &compile_options)
            .await
            .map_err(|e| Error::Compile {
                file: unit.path.clone(),
                message: format!("{e:#}"),
            })?;

        let warnings: Vec<Diagnostic> = compiled
            .warnings
            .iter()
            .cloned()
            .map(|warning| match warning.filename {
                Some(_) => warning,
                None => warning.with_filename(id),
            })
            .collect();
        self.reporter.report_all(&warnings);

        stage.advance(Stage::Emitting);
        let mut code = compiled.js.clone();
        if self.options.emit_css {
            if let Some(css) = compiled.stylesheet() {
                let key = naming::css_asset_key(id);
                self.session.assets().insert(key.clone(), css);
                code.push_str(&format!("\nimport {};", js_string_literal(&key)));
            }
        }

        for dependency in compiled.dependencies {
            if !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        }

        Ok(TransformOutput {
            code,
            map: compiled.map,
            dependencies,
        })
    }

    /// Re-materialize every known artifact before the bundler starts
    /// traversing the graph.
    pub async fn build_start(&self) -> Result<usize> {
        self.session.artifacts().materialize_all().await
    }

    /// Release the artifact behind `id` once the bundler has parsed it.
    pub async fn module_parsed(&self, id: &str) -> bool {
        if !naming::is_artifact_path(id, &self.options.extensions) {
            return false;
        }
        self.session.artifacts().release(Path::new(id)).await
    }

    /// Content of a virtual stylesheet.
    pub fn load(&self, id: &str) -> Option<String> {
        self.session.assets().get(id)
    }

    pub async fn resolve(&self, specifier: &str, importer: Option<&str>) -> Result<Resolution> {
        self.resolver.resolve(specifier, importer).await
    }

    /// Emit one advisory for every package whose metadata was hidden.
    pub fn flush_package_warnings(&self) -> Option<String> {
        let packages = self.session.take_inaccessible_packages();
        let message = inaccessible_packages_warning(&packages)?;
        warn!("{}", message);
        Some(message)
    }
}

/// Quote `value` as a JavaScript string literal.
fn js_string_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
