//! Bare-import resolution for component packages
//!
//! Component libraries often ship uncompiled `.svelte` sources and point to
//! them with a `svelte` field in `package.json`. For an import of the package
//! root (`import { Button } from 'my-ui'`) the resolver returns that entry;
//! everything else is left to the bundler's own resolution.

use path_clean::PathClean;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::error::Result;
use crate::package_json::{LookupError, find_package};
use crate::session::BuildSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Absolute path of the package's component entry
    Resolved(PathBuf),
    /// No opinion; the bundler resolves the specifier itself
    Defer,
}

/// Whether `specifier` names a package rather than a file or a virtual id.
pub fn is_bare_specifier(specifier: &str) -> bool {
    !specifier.is_empty()
        && !specifier.starts_with('.')
        && !specifier.starts_with('/')
        && !specifier.starts_with('\\')
        && !specifier.starts_with('\0')
        && !specifier.contains(':')
        && !Path::new(specifier).is_absolute()
}

/// Split a bare specifier into package name and remainder.
///
/// `@scope/pkg/a/b` gives `("@scope/pkg", "a/b")`, `pkg/a` gives
/// `("pkg", "a")`. A lone `@scope` is not a package name.
pub fn split_specifier(specifier: &str) -> Option<(&str, &str)> {
    let name_end = if specifier.starts_with('@') {
        let scope_end = specifier.find('/')?;
        match specifier[scope_end + 1..].find('/') {
            Some(offset) => scope_end + 1 + offset,
            None => specifier.len(),
        }
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };

    let name = &specifier[..name_end];
    if name.is_empty() || name.ends_with('/') {
        return None;
    }

    let rest = specifier
        .get(name_end + 1..)
        .unwrap_or("")
        .trim_end_matches('/');
    Some((name, rest))
}

/// Advisory listing packages whose metadata could not be checked.
pub fn inaccessible_packages_warning(packages: &[String]) -> Option<String> {
    if packages.is_empty() {
        return None;
    }

    let mut message = String::from(
        "The following packages do not export their package.json, so their \"svelte\" field could not be checked. \
         If importing components from one of them fails, ask its maintainers to add \"./package.json\" to \"exports\":",
    );
    for package in packages {
        message.push_str("\n- ");
        message.push_str(package);
    }
    Some(message)
}

/// Resolves package-root imports to the package's `svelte` entry.
#[derive(Debug, Clone)]
pub struct BareImportResolver {
    session: BuildSession,
}

impl BareImportResolver {
    pub fn new(session: BuildSession) -> Self {
        Self { session }
    }

    pub async fn resolve(&self, specifier: &str, importer: Option<&str>) -> Result<Resolution> {
        if !is_bare_specifier(specifier) || self.session.assets().contains(specifier) {
            return Ok(Resolution::Defer);
        }

        let Some(importer) = importer.filter(|importer| !importer.starts_with('\0')) else {
            return Ok(Resolution::Defer);
        };
        let Some((package, rest)) = split_specifier(specifier) else {
            return Ok(Resolution::Defer);
        };
        let Some(importer_dir) = Path::new(importer).parent() else {
            return Ok(Resolution::Defer);
        };

        match find_package(self.session.runtime().as_ref(), package, importer_dir).await {
            Ok(descriptor) => match descriptor.svelte_entry() {
                Some(entry) if rest.is_empty() => {
                    let entry = entry.clean();
                    trace!(specifier, entry = %entry.display(), "Resolved svelte entry");
                    Ok(Resolution::Resolved(entry))
                }
                _ => Ok(Resolution::Defer),
            },
            Err(LookupError::Missing) => {
                trace!(specifier, importer, "Package metadata not found, deferring");
                Ok(Resolution::Defer)
            }
            Err(LookupError::Inaccessible { package }) => {
                self.session.note_inaccessible_package(package);
                Ok(Resolution::Defer)
            }
            Err(LookupError::Failed(error)) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::MemoryRuntime;
    use std::sync::Arc;

    fn setup() -> (MemoryRuntime, BareImportResolver, BuildSession) {
        let runtime = MemoryRuntime::new();
        let session = BuildSession::new(Arc::new(runtime.clone()));
        (runtime, BareImportResolver::new(session.clone()), session)
    }

    const IMPORTER: Option<&str> = Some("/app/src/App.svelte");

    #[test]
    fn test_bare_specifiers() {
        assert!(is_bare_specifier("my-ui"));
        assert!(is_bare_specifier("@acme/ui/Button"));
        assert!(!is_bare_specifier("./Button.svelte"));
        assert!(!is_bare_specifier("../lib"));
        assert!(!is_bare_specifier("/abs/path.svelte"));
        assert!(!is_bare_specifier("\0virtual:thing"));
        assert!(!is_bare_specifier("node:fs"));
        assert!(!is_bare_specifier(""));
    }

    #[test]
    fn test_split_specifier() {
        assert_eq!(split_specifier("my-ui"), Some(("my-ui", "")));
        assert_eq!(split_specifier("my-ui/Button"), Some(("my-ui", "Button")));
        assert_eq!(
            split_specifier("@acme/ui/forms/Input"),
            Some(("@acme/ui", "forms/Input"))
        );
        assert_eq!(split_specifier("@acme/ui"), Some(("@acme/ui", "")));
        assert_eq!(split_specifier("@acme"), None);
        assert_eq!(split_specifier("@acme/"), None);
    }

    #[tokio::test]
    async fn test_resolves_svelte_field() {
        let (runtime, resolver, _) = setup();
        runtime.insert(
            "/app/node_modules/my-ui/package.json",
            r#"{"name":"my-ui","svelte":"./src/index.svelte","main":"dist/index.js"}"#,
        );

        assert_eq!(
            resolver.resolve("my-ui", IMPORTER).await.unwrap(),
            Resolution::Resolved(PathBuf::from("/app/node_modules/my-ui/src/index.svelte"))
        );
    }

    #[tokio::test]
    async fn test_subpath_defers() {
        let (runtime, resolver, _) = setup();
        runtime.insert(
            "/app/node_modules/my-ui/package.json",
            r#"{"name":"my-ui","svelte":"index.svelte"}"#,
        );
        assert_eq!(
            resolver.resolve("my-ui/Button", IMPORTER).await.unwrap(),
            Resolution::Defer
        );
    }

    #[tokio::test]
    async fn test_package_without_svelte_field_defers() {
        let (runtime, resolver, _) = setup();
        runtime.insert("/app/node_modules/my-ui/package.json", r#"{"name":"my-ui"}"#);
        assert_eq!(
            resolver.resolve("my-ui/Button", IMPORTER).await.unwrap(),
            Resolution::Defer
        );
        assert_eq!(
            resolver.resolve("my-ui", IMPORTER).await.unwrap(),
            Resolution::Defer
        );
    }

    #[tokio::test]
    async fn test_missing_package_defers() {
        let (_, resolver, _) = setup();
        assert_eq!(
            resolver.resolve("left-pad", IMPORTER).await.unwrap(),
            Resolution::Defer
        );
    }

    #[tokio::test]
    async fn test_inaccessible_package_is_recorded() {
        let (runtime, resolver, session) = setup();
        runtime.insert(
            "/app/node_modules/locked/package.json",
            r#"{"name":"locked","svelte":"index.svelte","exports":{".":"./index.js"}}"#,
        );

        assert_eq!(
            resolver.resolve("locked", IMPORTER).await.unwrap(),
            Resolution::Defer
        );
        assert_eq!(
            session.take_inaccessible_packages(),
            vec!["locked".to_string()]
        );
    }

    #[tokio::test]
    async fn test_malformed_metadata_is_fatal() {
        let (runtime, resolver, _) = setup();
        runtime.insert("/app/node_modules/broken/package.json", "{");
        let err = resolver.resolve("broken", IMPORTER).await.unwrap_err();
        assert!(matches!(err, Error::PackageMetadata { .. }));
    }

    #[tokio::test]
    async fn test_non_bare_and_virtual_keys_defer() {
        let (runtime, resolver, session) = setup();
        runtime.insert("/app/node_modules/x/package.json", r#"{"svelte":"x.svelte"}"#);
        session.assets().insert("x", "a{}");

        assert_eq!(resolver.resolve("x", IMPORTER).await.unwrap(), Resolution::Defer);
        assert_eq!(
            resolver.resolve("./x", IMPORTER).await.unwrap(),
            Resolution::Defer
        );
        assert_eq!(resolver.resolve("my-ui", None).await.unwrap(), Resolution::Defer);
    }

    #[test]
    fn test_warning_lists_packages() {
        assert_eq!(inaccessible_packages_warning(&[]), None);
        let message =
            inaccessible_packages_warning(&["a".to_string(), "@b/c".to_string()]).unwrap();
        assert!(message.ends_with("\n- a\n- @b/c"));
    }
}
