//! Package metadata lookup for bare-import resolution.
//!
//! Only the fields the resolver needs are read: the custom `svelte` entry
//! point and the `exports` map, which decides whether `package.json` itself
//! is reachable by consumers.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::runtime::Runtime;

/// Maximum allowed size for package.json files (10MB)
const MAX_PACKAGE_JSON_SIZE: u64 = 10 * 1024 * 1024;

const PACKAGE_JSON_SUBPATH: &str = "./package.json";

/// The parts of a package's `package.json` the resolver uses.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    /// Directory containing `package.json`
    pub dir: PathBuf,
    pub name: Option<String>,
    /// Custom component entry point, relative to `dir`
    pub svelte: Option<String>,
    pub exports: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawPackageJson {
    name: Option<String>,
    svelte: Option<Value>,
    exports: Option<Value>,
}

impl PackageDescriptor {
    /// Parse `package.json` content found in `dir`.
    pub fn parse(dir: impl Into<PathBuf>, content: &str) -> Result<Self, Error> {
        let dir = dir.into();
        let raw: RawPackageJson =
            serde_json::from_str(content).map_err(|e| Error::PackageMetadata {
                path: dir.join("package.json"),
                reason: format!("Invalid package.json format: {e}"),
            })?;

        Ok(Self {
            dir,
            name: raw.name,
            svelte: raw
                .svelte
                .and_then(|value| value.as_str().map(str::to_string)),
            exports: raw.exports,
        })
    }

    /// Absolute path of the `svelte` entry, if declared.
    pub fn svelte_entry(&self) -> Option<PathBuf> {
        self.svelte.as_deref().map(|entry| self.dir.join(entry))
    }

    /// Whether the `exports` map keeps `package.json` out of reach.
    ///
    /// Without `exports` every file is reachable. A string, an array or a
    /// conditions object only exports the package root. A subpath map exposes
    /// `package.json` through an exact `./package.json` key or a matching
    /// `*` pattern, unless that entry is `null`.
    pub fn hides_package_json(&self) -> bool {
        match &self.exports {
            None => false,
            Some(Value::Object(map)) => {
                let is_subpath_map = map.keys().all(|key| key.starts_with('.'));
                if !is_subpath_map {
                    return true;
                }

                if let Some(target) = map.get(PACKAGE_JSON_SUBPATH) {
                    return target.is_null();
                }

                !map.iter().any(|(key, target)| {
                    !target.is_null() && subpath_pattern_matches(key, PACKAGE_JSON_SUBPATH)
                })
            }
            Some(_) => true,
        }
    }
}

/// Match `./dir/*.json`-style subpath patterns (one `*` at most).
fn subpath_pattern_matches(pattern: &str, subpath: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            subpath.len() >= prefix.len() + suffix.len()
                && subpath.starts_with(prefix)
                && subpath.ends_with(suffix)
        }
        None => pattern == subpath,
    }
}

/// Why a package's metadata could not be used.
#[derive(Debug)]
pub enum LookupError {
    /// No `node_modules/<package>/package.json` above the importer
    Missing,
    /// The package exists but its `exports` map hides `package.json`
    Inaccessible { package: String },
    /// The metadata exists but could not be read or parsed
    Failed(Error),
}

impl From<Error> for LookupError {
    fn from(error: Error) -> Self {
        LookupError::Failed(error)
    }
}

/// Find `node_modules/<package>/package.json`, walking up from `importer_dir`.
pub async fn find_package(
    runtime: &dyn Runtime,
    package: &str,
    importer_dir: &Path,
) -> Result<PackageDescriptor, LookupError> {
    if package
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(LookupError::Missing);
    }

    for dir in importer_dir.ancestors() {
        let package_dir = dir.join("node_modules").join(package);
        let package_json = package_dir.join("package.json");

        if !runtime.exists(&package_json) {
            continue;
        }

        let descriptor = load(runtime, &package_dir, &package_json).await?;
        if descriptor.hides_package_json() {
            return Err(LookupError::Inaccessible {
                package: package.to_string(),
            });
        }
        return Ok(descriptor);
    }

    Err(LookupError::Missing)
}

async fn load(
    runtime: &dyn Runtime,
    package_dir: &Path,
    path: &Path,
) -> Result<PackageDescriptor, Error> {
    let failed = |reason: String| Error::PackageMetadata {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = runtime
        .metadata(path)
        .await
        .map_err(|e| failed(format!("Cannot read package.json metadata: {e}")))?;

    if metadata.size > MAX_PACKAGE_JSON_SIZE {
        return Err(failed(format!(
            "package.json exceeds maximum size of {}MB",
            MAX_PACKAGE_JSON_SIZE / 1024 / 1024
        )));
    }

    let bytes = runtime
        .read_file(path)
        .await
        .map_err(|e| failed(format!("Failed to read package.json: {e}")))?;

    let content = String::from_utf8(bytes)
        .map_err(|e| failed(format!("package.json contains invalid UTF-8: {e}")))?;

    PackageDescriptor::parse(package_dir, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MemoryRuntime;
    use serde_json::json;

    fn descriptor(exports: Value) -> PackageDescriptor {
        PackageDescriptor {
            dir: PathBuf::from("/app/node_modules/ui"),
            name: Some("ui".to_string()),
            svelte: None,
            exports: Some(exports),
        }
    }

    #[test]
    fn test_exports_visibility() {
        assert!(descriptor(json!("./index.js")).hides_package_json());
        assert!(descriptor(json!(["./index.js"])).hides_package_json());
        assert!(
            descriptor(json!({ "import": "./index.mjs", "require": "./index.cjs" }))
                .hides_package_json()
        );
        assert!(descriptor(json!({ ".": "./index.js" })).hides_package_json());
        assert!(
            !descriptor(json!({ ".": "./index.js", "./package.json": "./package.json" }))
                .hides_package_json()
        );
        assert!(!descriptor(json!({ ".": "./index.js", "./*": "./*" })).hides_package_json());
        assert!(!descriptor(json!({ "./*.json": "./*.json" })).hides_package_json());
        assert!(
            descriptor(json!({ "./*": "./*", "./package.json": null })).hides_package_json()
        );
        assert!(descriptor(json!({ "./lib/*": "./lib/*" })).hides_package_json());
    }

    #[test]
    fn test_no_exports_is_visible() {
        let d = PackageDescriptor::parse("/app/node_modules/ui", r#"{"name":"ui"}"#).unwrap();
        assert!(!d.hides_package_json());
        assert_eq!(d.svelte_entry(), None);
    }

    #[test]
    fn test_svelte_entry() {
        let d = PackageDescriptor::parse(
            "/app/node_modules/ui",
            r#"{"name":"ui","svelte":"src/index.svelte"}"#,
        )
        .unwrap();
        assert_eq!(
            d.svelte_entry(),
            Some(PathBuf::from("/app/node_modules/ui/src/index.svelte"))
        );
    }

    #[tokio::test]
    async fn test_find_walks_up() {
        let runtime = MemoryRuntime::new();
        runtime.insert(
            "/app/node_modules/@acme/ui/package.json",
            r#"{"name":"@acme/ui","svelte":"index.svelte"}"#,
        );

        let d = find_package(&runtime, "@acme/ui", Path::new("/app/src/routes/blog"))
            .await
            .unwrap();
        assert_eq!(d.dir, PathBuf::from("/app/node_modules/@acme/ui"));
        assert_eq!(d.svelte.as_deref(), Some("index.svelte"));
    }

    #[tokio::test]
    async fn test_nearest_package_wins() {
        let runtime = MemoryRuntime::new();
        runtime.insert("/app/node_modules/ui/package.json", r#"{"svelte":"outer.svelte"}"#);
        runtime.insert(
            "/app/packages/site/node_modules/ui/package.json",
            r#"{"svelte":"inner.svelte"}"#,
        );

        let d = find_package(&runtime, "ui", Path::new("/app/packages/site/src"))
            .await
            .unwrap();
        assert_eq!(d.svelte.as_deref(), Some("inner.svelte"));
    }

    #[tokio::test]
    async fn test_missing_package() {
        let runtime = MemoryRuntime::new();
        let err = find_package(&runtime, "nope", Path::new("/app/src"))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Missing));
    }

    #[tokio::test]
    async fn test_inaccessible_package() {
        let runtime = MemoryRuntime::new();
        runtime.insert(
            "/app/node_modules/locked/package.json",
            r#"{"name":"locked","exports":{".":"./index.js"}}"#,
        );
        let err = find_package(&runtime, "locked", Path::new("/app/src"))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Inaccessible { ref package } if package == "locked"));
    }

    #[tokio::test]
    async fn test_malformed_package_json_is_fatal() {
        let runtime = MemoryRuntime::new();
        runtime.insert("/app/node_modules/broken/package.json", "{ not json");
        let err = find_package(&runtime, "broken", Path::new("/app"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LookupError::Failed(Error::PackageMetadata { .. })
        ));
    }

    #[tokio::test]
    async fn test_traversal_segments_are_missing() {
        let runtime = MemoryRuntime::new();
        runtime.insert("/app/package.json", "{}");
        let err = find_package(&runtime, "..", Path::new("/app/node_modules/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Missing));
    }
}
