//! Rolldown plugin wiring
//!
//! ```text
//! build_start    → re-materialize known artifacts
//! resolve_id     → virtual stylesheets, then `svelte` package entries
//! load           → virtual stylesheet content
//! transform      → extract, rewrite, compile, emit CSS
//! module_parsed  → release artifacts the bundler has parsed
//! generate_bundle → report packages with hidden package.json
//! ```

use anyhow::Context;
use rolldown_common::{ModuleInfo, ModuleType, NormalModule};
use rolldown_plugin::{
    HookBuildStartArgs, HookGenerateBundleArgs, HookLoadArgs, HookLoadOutput, HookLoadReturn,
    HookNoopReturn, HookResolveIdArgs, HookResolveIdOutput, HookResolveIdReturn,
    HookTransformArgs, HookTransformOutput, HookTransformReturn, HookUsage, Plugin, PluginContext,
    SharedTransformPluginContext,
};
use rolldown_sourcemap::SourceMap;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

use crate::compiler::ComponentCompiler;
use crate::config::SvelteInlineOptions;
use crate::error::Result;
use crate::pipeline::SvelteInlinePipeline;
use crate::resolver::Resolution;
use crate::runtime::Runtime;

/// Rolldown plugin that compiles Svelte components with inline sub-components
///
/// # Example
///
/// ```rust,ignore
/// use fob_plugin_svelte_inline::{FobSvelteInlinePlugin, SvelteInlineOptions};
/// use std::sync::Arc;
///
/// let options = SvelteInlineOptions::new().with_emit_css(true);
/// let plugin = Arc::new(FobSvelteInlinePlugin::with_options(options, Arc::new(MyCompiler)));
/// // Add to your Rolldown bundler configuration
/// ```
#[derive(Debug, Clone)]
pub struct FobSvelteInlinePlugin {
    pipeline: SvelteInlinePipeline,
}

impl FobSvelteInlinePlugin {
    /// Default options on the native filesystem
    #[cfg(not(target_family = "wasm"))]
    pub fn new(compiler: Arc<dyn ComponentCompiler>) -> Self {
        Self::with_options(SvelteInlineOptions::default(), compiler)
    }

    #[cfg(not(target_family = "wasm"))]
    pub fn with_options(options: SvelteInlineOptions, compiler: Arc<dyn ComponentCompiler>) -> Self {
        Self::with_runtime(
            options,
            compiler,
            Arc::new(crate::runtime::NativeRuntime::new()),
        )
    }

    /// Use a custom filesystem runtime
    pub fn with_runtime(
        options: SvelteInlineOptions,
        compiler: Arc<dyn ComponentCompiler>,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            pipeline: SvelteInlinePipeline::new(options, compiler, runtime),
        }
    }

    /// Build from a JSON options object. Unknown keys are reported and ignored.
    #[cfg(not(target_family = "wasm"))]
    pub fn from_json(
        options: &serde_json::Value,
        compiler: Arc<dyn ComponentCompiler>,
    ) -> Result<Self> {
        Ok(Self::with_options(
            SvelteInlineOptions::from_json(options)?,
            compiler,
        ))
    }

    pub fn pipeline(&self) -> &SvelteInlinePipeline {
        &self.pipeline
    }
}

impl Plugin for FobSvelteInlinePlugin {
    fn name(&self) -> Cow<'static, str> {
        "fob-svelte-inline".into()
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::BuildStart
            | HookUsage::ResolveId
            | HookUsage::Load
            | HookUsage::Transform
            | HookUsage::ModuleParsed
            | HookUsage::GenerateBundle
    }

    /// Restore artifacts deleted by a previous build's cleanup
    fn build_start(
        &self,
        _ctx: &PluginContext,
        _args: &HookBuildStartArgs<'_>,
    ) -> impl std::future::Future<Output = HookNoopReturn> + Send {
        let pipeline = self.pipeline.clone();

        async move {
            pipeline
                .build_start()
                .await
                .context("Failed to materialize inline sub-components")?;
            Ok(())
        }
    }

    fn resolve_id(
        &self,
        _ctx: &PluginContext,
        args: &HookResolveIdArgs<'_>,
    ) -> impl std::future::Future<Output = HookResolveIdReturn> + Send {
        let specifier = args.specifier.to_string();
        let importer = args.importer.map(|s| s.to_string());
        let pipeline = self.pipeline.clone();

        async move {
            // Virtual stylesheets resolve to themselves
            if pipeline.session().assets().contains(&specifier) {
                return Ok(Some(HookResolveIdOutput {
                    id: specifier.into(),
                    ..Default::default()
                }));
            }

            let resolution = pipeline
                .resolve(&specifier, importer.as_deref())
                .await
                .with_context(|| format!("Failed to resolve '{}'", specifier))?;

            match resolution {
                Resolution::Resolved(path) => Ok(Some(HookResolveIdOutput {
                    id: path.to_string_lossy().into_owned().into(),
                    ..Default::default()
                })),
                Resolution::Defer => Ok(None),
            }
        }
    }

    fn load(
        &self,
        _ctx: &PluginContext,
        args: &HookLoadArgs<'_>,
    ) -> impl std::future::Future<Output = HookLoadReturn> + Send {
        let id = args.id.to_string();
        let pipeline = self.pipeline.clone();

        async move {
            Ok(pipeline.load(&id).map(|css| HookLoadOutput {
                code: css.into(),
                module_type: Some(ModuleType::Css),
                ..Default::default()
            }))
        }
    }

    fn transform(
        &self,
        ctx: SharedTransformPluginContext,
        args: &HookTransformArgs<'_>,
    ) -> impl std::future::Future<Output = HookTransformReturn> + Send {
        let id = args.id.to_string();
        let code = args.code.to_string();
        let pipeline = self.pipeline.clone();

        async move {
            let Some(output) = pipeline
                .transform(&code, &id)
                .await
                .with_context(|| format!("Failed to transform Svelte component: {}", id))?
            else {
                return Ok(None);
            };

            for dependency in &output.dependencies {
                ctx.add_watch_file(dependency);
            }

            let map = parse_source_map(output.map.as_deref(), &id);

            Ok(Some(HookTransformOutput {
                code: Some(output.code),
                map,
                side_effects: None,
                module_type: Some(ModuleType::Js),
            }))
        }
    }

    /// Delete an artifact as soon as the bundler no longer needs the file
    fn module_parsed(
        &self,
        _ctx: &PluginContext,
        module_info: Arc<ModuleInfo>,
        _normal_module: &NormalModule,
    ) -> impl std::future::Future<Output = HookNoopReturn> + Send {
        let id: &str = module_info.id.as_ref();
        let id = id.to_string();
        let pipeline = self.pipeline.clone();

        async move {
            pipeline.module_parsed(&id).await;
            Ok(())
        }
    }

    fn generate_bundle(
        &self,
        _ctx: &PluginContext,
        _args: &mut HookGenerateBundleArgs<'_>,
    ) -> impl std::future::Future<Output = HookNoopReturn> + Send {
        let pipeline = self.pipeline.clone();

        async move {
            pipeline.flush_package_warnings();
            Ok(())
        }
    }
}

/// Parse the compiler's JSON source map. A map that does not parse is dropped
/// so the component still builds, only without mappings.
fn parse_source_map(map: Option<&str>, id: &str) -> Option<SourceMap> {
    let json = map?;
    match SourceMap::from_json_string(json) {
        Ok(map) => Some(map),
        Err(e) => {
            debug!(id, error = ?e, "Ignoring invalid compiler source map");
            None
        }
    }
}
