//! Identity and naming for extracted sub-components
//!
//! A block declared as `NavLink` inside `/src/App.svelte` is materialized as
//! `/src/App__NavLink.svelte`. The file name is a pure function of the parent
//! path and the declared name, so repeated builds produce the same artifacts,
//! and the declared name can be recovered from the file name alone.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Reserved separator between the parent's base name and the declared name.
pub const SEPARATOR: &str = "__";

static DECLARED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_]*$").expect("declared name pattern is valid"));

/// Whether `name` can be used as a sub-component name.
///
/// Names start with an uppercase ASCII letter followed by ASCII letters,
/// digits or `_`, and never contain the reserved separator.
pub fn is_valid_declared_name(name: &str) -> bool {
    DECLARED_NAME.is_match(name) && !name.contains(SEPARATOR)
}

pub fn validate_declared_name(name: &str, file: &Path) -> Result<()> {
    if is_valid_declared_name(name) {
        Ok(())
    } else {
        Err(Error::invalid_name(file, name))
    }
}

/// `<parentStem>__<Name>.<parentExt>`
pub fn artifact_file_name(parent: &Path, name: &str) -> String {
    let stem = parent
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();

    match parent.extension() {
        Some(ext) => format!("{}{}{}.{}", stem, SEPARATOR, name, ext.to_string_lossy()),
        None => format!("{}{}{}", stem, SEPARATOR, name),
    }
}

/// Absolute artifact path, next to the parent file.
pub fn artifact_path(parent: &Path, name: &str) -> PathBuf {
    parent.with_file_name(artifact_file_name(parent, name))
}

/// File name component of an artifact path.
pub fn artifact_file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Recover the declared name from an artifact file name.
///
/// Returns `None` if the file name was not produced by [`artifact_file_name`].
pub fn declared_name_from_file_name(file_name: &str) -> Option<&str> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let (_, name) = stem.rsplit_once(SEPARATOR)?;
    is_valid_declared_name(name).then_some(name)
}

/// Whether `id` looks like an artifact for one of the claimed extensions.
///
/// `extensions` use the `.svelte` form.
pub fn is_artifact_path(id: &str, extensions: &[String]) -> bool {
    let path = Path::new(id);

    let has_claimed_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            extensions
                .iter()
                .any(|claimed| claimed.trim_start_matches('.') == ext)
        });

    has_claimed_extension
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(declared_name_from_file_name)
            .is_some()
}

/// Virtual stylesheet key for a component: its path with a `.css` extension.
pub fn css_asset_key(id: &str) -> String {
    Path::new(id)
        .with_extension("css")
        .to_string_lossy()
        .into_owned()
}
