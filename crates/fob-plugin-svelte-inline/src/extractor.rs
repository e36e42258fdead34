//! Inline sub-component extractor.
//!
//! A component can declare nested components inline:
//!
//! ```svelte
//! <script>
//!   let links = ['/', '/about']
//! </script>
//!
//! {#each links as link}
//!   <NavLink {link} />
//! {/each}
//!
//! <template name="NavLink">
//!   <script>export let link</script>
//!   <a href={link}>{link}</a>
//! </template>
//! ```
//!
//! The extractor removes every `<template name="...">` block from the parent
//! and returns one [`SubComponentRecord`] per declared name.
//!
//! ## Scanning
//!
//! The scanner only recognizes `<template ...>` openings and `</template>`
//! closings. HTML comments and raw-text `<script>`/`<style>` elements are
//! skipped whole, so markers inside strings or CSS never match. Inside a block
//! every nested `<template>` (named or not) increases the depth, which pairs
//! each start marker with its own end marker. Block bodies are opaque: nested
//! named blocks are extracted later, when the host compiles the artifact.

use memchr::{memchr, memmem};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::config::DuplicatePolicy;
use crate::error::{Error, Result};
use crate::naming;

/// Maximum component size in bytes (10 MB)
pub const MAX_SOURCE_SIZE: usize = 10 * 1024 * 1024;

const TEMPLATE_TAG: &[u8] = b"template";
const NAME_ATTRIBUTE: &str = "name";

/// An inline component lifted out of its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubComponentRecord {
    /// Declared name, e.g. `NavLink`
    pub name: String,
    /// Absolute artifact path, e.g. `/src/App__NavLink.svelte`
    pub path: PathBuf,
    /// Raw block body, written verbatim to `path`
    pub body: String,
}

impl SubComponentRecord {
    pub fn new(parent: &Path, name: impl Into<String>, body: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: naming::artifact_path(parent, &name),
            name,
            body: body.into(),
        }
    }

    /// What the parent keeps after extraction: the name and the artifact file name.
    pub fn import(&self) -> ExtractedImport {
        ExtractedImport {
            name: self.name.clone(),
            file_name: naming::artifact_file_name_of(&self.path),
        }
    }
}

/// An import binding the rewriter injects into the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImport {
    pub name: String,
    pub file_name: String,
}

/// Result of scanning one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Parent text with every block removed
    pub residual: String,
    /// One record per distinct declared name, in first-seen order
    pub records: Vec<SubComponentRecord>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn imports(&self) -> Vec<ExtractedImport> {
        self.records.iter().map(SubComponentRecord::import).collect()
    }
}

/// Extract every inline block from `source`.
///
/// Nothing is returned unless the whole file scans cleanly: an invalid name
/// or an unclosed block fails the entire extraction.
pub fn extract(source: &str, file: &Path, duplicates: DuplicatePolicy) -> Result<Extraction> {
    if source.len() > MAX_SOURCE_SIZE {
        return Err(Error::SourceTooLarge {
            file: file.to_path_buf(),
            size: source.len(),
            max: MAX_SOURCE_SIZE,
        });
    }

    let mut residual = String::with_capacity(source.len());
    let mut records: Vec<SubComponentRecord> = Vec::new();
    let mut by_name: FxHashMap<String, usize> = FxHashMap::default();
    let mut copied = 0;
    let mut pointer = 0;

    while let Some(tag) = next_template_tag(source, pointer) {
        pointer = tag.end;

        let name = match &tag.kind {
            TagKind::Open {
                name: Some(name),
                self_closing: false,
            } => name.clone(),
            _ => continue,
        };

        naming::validate_declared_name(&name, file)?;

        let (close_start, close_end) =
            find_matching_close(source, tag.end).ok_or_else(|| Error::UnclosedBlock {
                file: file.to_path_buf(),
                name: name.clone(),
                offset: tag.start,
            })?;

        let record = SubComponentRecord::new(file, name.clone(), &source[tag.end..close_start]);
        match by_name.get(&name) {
            Some(&index) => match duplicates {
                DuplicatePolicy::LastWins => {
                    tracing::debug!(
                        file = %file.display(),
                        name = %name,
                        "duplicate sub-component, keeping the later block"
                    );
                    records[index] = record;
                }
                DuplicatePolicy::Error => return Err(Error::duplicate(file, name)),
            },
            None => {
                by_name.insert(name, records.len());
                records.push(record);
            }
        }

        residual.push_str(&source[copied..tag.start]);
        copied = close_end;
        pointer = close_end;
    }

    if records.is_empty() {
        return Ok(Extraction {
            residual: source.to_string(),
            records,
        });
    }

    residual.push_str(&source[copied..]);
    Ok(Extraction { residual, records })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagKind {
    Open {
        name: Option<String>,
        self_closing: bool,
    },
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tag {
    kind: TagKind,
    /// Offset of `<`
    start: usize,
    /// Offset just past `>`
    end: usize,
}

/// Find the next `<template` / `</template` tag at or after `from`.
///
/// An opening tag without a closing `>` ends the scan.
fn next_template_tag(source: &str, from: usize) -> Option<Tag> {
    let bytes = source.as_bytes();
    let mut pointer = from;

    while pointer < bytes.len() {
        let lt = pointer + memchr(b'<', &bytes[pointer..])?;
        let rest = &bytes[lt..];

        if rest.starts_with(b"<!--") {
            pointer = match memmem::find(&rest[4..], b"-->") {
                Some(end) => lt + 4 + end + 3,
                None => return None,
            };
            continue;
        }

        if let Some(raw_end) = skip_raw_text_element(bytes, lt) {
            pointer = raw_end;
            continue;
        }

        if rest.starts_with(b"</") && is_tag_named(bytes, lt + 2, TEMPLATE_TAG) {
            let close = find_closing_angle(bytes, lt + 2 + TEMPLATE_TAG.len())?;
            return Some(Tag {
                kind: TagKind::Close,
                start: lt,
                end: close + 1,
            });
        }

        if is_tag_named(bytes, lt + 1, TEMPLATE_TAG) {
            let attrs_start = lt + 1 + TEMPLATE_TAG.len();
            let close = find_closing_angle(bytes, attrs_start)?;
            let attrs = &source[attrs_start..close];
            let self_closing = attrs.trim_end().ends_with('/');
            return Some(Tag {
                kind: TagKind::Open {
                    name: attribute_value(attrs.trim_end_matches('/'), NAME_ATTRIBUTE)
                        .map(str::to_string),
                    self_closing,
                },
                start: lt,
                end: close + 1,
            });
        }

        pointer = lt + 1;
    }

    None
}

/// Returns `(start of </template>, end of </template>)` for the block whose
/// body starts at `body_start`.
fn find_matching_close(source: &str, body_start: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pointer = body_start;

    while let Some(tag) = next_template_tag(source, pointer) {
        pointer = tag.end;
        match tag.kind {
            TagKind::Open {
                self_closing: false,
                ..
            } => depth += 1,
            TagKind::Open { .. } => {}
            TagKind::Close => {
                depth -= 1;
                if depth == 0 {
                    return Some((tag.start, tag.end));
                }
            }
        }
    }

    None
}

/// If a `<script` or `<style` element starts at `lt`, return the offset just
/// past its closing tag (or the end of input when it is never closed).
pub(crate) fn skip_raw_text_element(bytes: &[u8], lt: usize) -> Option<usize> {
    let tag: &[u8] = if is_tag_named(bytes, lt + 1, b"script") {
        b"script"
    } else if is_tag_named(bytes, lt + 1, b"style") {
        b"style"
    } else {
        return None;
    };

    let open_end = match find_closing_angle(bytes, lt + 1 + tag.len()) {
        Some(pos) => pos + 1,
        None => return Some(bytes.len()),
    };

    let mut closing = Vec::with_capacity(tag.len() + 2);
    closing.extend_from_slice(b"</");
    closing.extend_from_slice(tag);

    let mut search = open_end;
    while let Some(found) = memmem::find(&bytes[search..], &closing) {
        let close_start = search + found;
        if is_tag_boundary(bytes, close_start + closing.len()) {
            return Some(
                find_closing_angle(bytes, close_start + closing.len())
                    .map(|pos| pos + 1)
                    .unwrap_or(bytes.len()),
            );
        }
        search = close_start + closing.len();
    }

    Some(bytes.len())
}

/// Whether `bytes[at..]` starts with `name` followed by a tag boundary.
pub(crate) fn is_tag_named(bytes: &[u8], at: usize, name: &[u8]) -> bool {
    bytes
        .get(at..at + name.len())
        .is_some_and(|candidate| candidate == name)
        && is_tag_boundary(bytes, at + name.len())
}

/// A tag name ends at whitespace, `>` or `/` (not `<scripts` or `<templates`).
pub(crate) fn is_tag_boundary(bytes: &[u8], at: usize) -> bool {
    matches!(
        bytes.get(at),
        Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/')
    )
}

/// Finds the `>` that closes a tag, ignoring `>` inside quoted attribute values.
pub(crate) fn find_closing_angle(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;

    for (i, &byte) in bytes.get(start..)?.iter().enumerate() {
        match (quote, byte) {
            (None, b'"' | b'\'') => quote = Some(byte),
            (Some(q), _) if byte == q => quote = None,
            (None, b'>') => return Some(start + i),
            _ => {}
        }
    }

    None
}

/// Value of attribute `name` in a tag's attribute text.
///
/// Handles `name="X"`, `name='X'` and `name=X`. Attributes whose name merely
/// ends with `name` (`data-name`) are not matched.
pub(crate) fn attribute_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = attrs;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }

        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = rest[key_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                match after.chars().next() {
                    Some(quote @ ('"' | '\'')) => {
                        let inner = &after[1..];
                        let end = inner.find(quote).unwrap_or(inner.len());
                        rest = inner.get(end + 1..).unwrap_or("");
                        Some(&inner[..end])
                    }
                    Some(_) => {
                        let end = after.find(char::is_whitespace).unwrap_or(after.len());
                        rest = &after[end..];
                        Some(&after[..end])
                    }
                    None => {
                        rest = "";
                        Some("")
                    }
                }
            }
            None => None,
        };

        if key == name {
            return value;
        }
    }
}
