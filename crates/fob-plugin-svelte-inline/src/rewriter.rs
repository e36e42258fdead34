//! Import rewriter
//!
//! After extraction the parent still uses `<NavLink />` but no longer defines
//! it. The rewriter adds one import per extracted sub-component at the top of
//! the parent's instance `<script>`:
//!
//! ```svelte
//! <script>
//! import NavLink from './App__NavLink.svelte';
//!   let links = ['/', '/about']
//! </script>
//! ```

use memchr::{memchr, memchr2, memmem};
use std::path::Path;

use crate::error::{Error, Result};
use crate::extractor::{
    ExtractedImport, attribute_value, find_closing_angle, is_tag_boundary, is_tag_named,
    skip_raw_text_element,
};
use crate::naming;

const SCRIPT_TAG: &[u8] = b"script";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScriptTag {
    /// Offset just past the opening tag's `>`
    content_start: usize,
    /// `context="module"` or a bare `module` attribute
    module: bool,
}

/// Inject an import for every extracted sub-component into `residual`.
///
/// Imports go right after the opening tag of the first instance script, or
/// of the first script of any kind when the component only has a module
/// script. A component without any script gets a new one at the top.
pub fn inject_imports(residual: &str, file: &Path, imports: &[ExtractedImport]) -> Result<String> {
    if imports.is_empty() {
        return Ok(residual.to_string());
    }

    let block = import_block(imports);
    let scripts = script_tags(residual, file)?;

    let target = scripts
        .iter()
        .find(|script| !script.module)
        .or_else(|| scripts.first());

    let rewritten = match target {
        Some(script) => {
            let at = script.content_start;
            let mut out = String::with_capacity(residual.len() + block.len());
            out.push_str(&residual[..at]);
            out.push_str(&block);
            out.push_str(&residual[at..]);
            out
        }
        None => format!("<script>{}\n</script>\n{}", block, residual),
    };

    Ok(rewritten)
}

/// `\nimport Name from './Parent__Name.svelte';` per import, in order.
fn import_block(imports: &[ExtractedImport]) -> String {
    let mut block = String::new();
    for import in imports {
        let binding =
            naming::declared_name_from_file_name(&import.file_name).unwrap_or(&import.name);
        block.push_str(&format!(
            "\nimport {} from './{}';",
            binding, import.file_name
        ));
    }
    block
}

/// Elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Whether an open `current` element ends implicitly when `next` opens,
/// as with `<li>a<li>b`.
fn closing_tag_omitted(current: &str, next: &str) -> bool {
    let closed_by: &[&str] = match current {
        "li" => &["li"],
        "dt" | "dd" => &["dt", "dd"],
        "p" => &[
            "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer",
            "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "main", "menu",
            "nav", "ol", "p", "pre", "section", "table", "ul",
        ],
        "rt" | "rp" => &["rt", "rp"],
        "optgroup" => &["optgroup"],
        "option" => &["option", "optgroup"],
        "thead" => &["tbody", "tfoot"],
        "tbody" => &["tbody", "tfoot"],
        "tfoot" => &["tbody"],
        "tr" => &["tr", "tbody"],
        "td" | "th" => &["td", "th", "tr"],
        _ => &[],
    };
    closed_by.contains(&next)
}

/// Stack of element names still open at the scan position.
#[derive(Debug, Default)]
struct OpenElements {
    names: Vec<String>,
}

impl OpenElements {
    fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn push(&mut self, name: String) {
        self.names.push(name);
    }

    /// Pop the innermost element if opening `next` ends it implicitly.
    fn close_omitted_before(&mut self, next: &str) {
        if self
            .names
            .last()
            .is_some_and(|current| closing_tag_omitted(current, next))
        {
            self.names.pop();
        }
    }

    /// `</name>` closes the innermost open `name` and everything opened
    /// inside it. A closing tag with nothing to match is ignored.
    fn close(&mut self, name: &str) {
        if let Some(index) = self.names.iter().rposition(|open| open == name) {
            self.names.truncate(index);
        }
    }
}

/// Every top-level `<script>` opening tag, skipping comments and styles.
///
/// Open elements are tracked so scripts nested in markup (`<svelte:head>`,
/// `<div>`) are not mistaken for the component's own scripts. Template
/// expressions in braces are opaque.
fn script_tags(source: &str, file: &Path) -> Result<Vec<ScriptTag>> {
    let bytes = source.as_bytes();
    let mut tags = Vec::new();
    let mut open = OpenElements::default();
    let mut pointer = 0;

    while pointer < bytes.len() {
        let Some(offset) = memchr2(b'<', b'{', &bytes[pointer..]) else {
            break;
        };
        let at = pointer + offset;

        if bytes[at] == b'{' {
            pointer = skip_expression(bytes, at);
            continue;
        }

        if bytes[at..].starts_with(b"<!--") {
            match memmem::find(&bytes[at + 4..], b"-->") {
                Some(end) => {
                    pointer = at + 4 + end + 3;
                    continue;
                }
                None => break,
            }
        }

        if bytes[at..].starts_with(b"</") && bytes.get(at + 2).is_some_and(u8::is_ascii_alphabetic)
        {
            let Some(close) = find_tag_end(bytes, at + 2) else {
                break;
            };
            let name_end = (at + 2..close)
                .find(|&i| is_tag_boundary(bytes, i))
                .unwrap_or(close);
            open.close(&source[at + 2..name_end]);
            pointer = close + 1;
            continue;
        }

        if is_tag_named(bytes, at + 1, SCRIPT_TAG) {
            let attrs_start = at + 1 + SCRIPT_TAG.len();
            let close = find_closing_angle(bytes, attrs_start).ok_or_else(|| {
                Error::NoConfigBlock {
                    file: file.to_path_buf(),
                }
            })?;

            if open.is_empty() {
                tags.push(ScriptTag {
                    content_start: close + 1,
                    module: is_module_script(&source[attrs_start..close]),
                });
            }
        }

        if let Some(end) = skip_raw_text_element(bytes, at) {
            pointer = end;
            continue;
        }

        if bytes.get(at + 1).is_some_and(u8::is_ascii_alphabetic) {
            let name_end = (at + 1..bytes.len())
                .find(|&i| is_tag_boundary(bytes, i))
                .unwrap_or(bytes.len());
            let Some(close) = find_tag_end(bytes, name_end) else {
                break;
            };
            let name = &source[at + 1..name_end];
            open.close_omitted_before(name);
            let self_closing = bytes[..close].ends_with(b"/");
            if !self_closing && !VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
                open.push(name.to_string());
            }
            pointer = close + 1;
            continue;
        }

        pointer = at + 1;
    }

    Ok(tags)
}

/// Offset just past the `}` matching the `{` at `open`.
fn skip_expression(bytes: &[u8], open: usize) -> usize {
    let mut nesting = 0usize;
    let mut quote: Option<u8> = None;
    let mut pointer = open;

    while pointer < bytes.len() {
        let byte = bytes[pointer];
        match (quote, byte) {
            (Some(_), b'\\') => pointer += 1,
            (Some(q), _) if byte == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'' | b'`') => quote = Some(byte),
            (None, b'{') => nesting += 1,
            (None, b'}') => {
                nesting -= 1;
                if nesting == 0 {
                    return pointer + 1;
                }
            }
            _ => {}
        }
        pointer += 1;
    }

    bytes.len()
}

/// The `>` ending a tag, ignoring `>` in quoted values and `{...}` expressions.
fn find_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pointer = start;

    while pointer < bytes.len() {
        match bytes[pointer] {
            b'{' => {
                pointer = skip_expression(bytes, pointer);
                continue;
            }
            quote @ (b'"' | b'\'') => {
                pointer = match memchr(quote, &bytes[pointer + 1..]) {
                    Some(end) => pointer + 1 + end + 1,
                    None => return None,
                };
                continue;
            }
            b'>' => return Some(pointer),
            _ => pointer += 1,
        }
    }

    None
}

fn is_module_script(attrs: &str) -> bool {
    attribute_value(attrs, "context") == Some("module")
        || attrs
            .split_whitespace()
            .any(|attr| attr.trim_end_matches('/') == "module")
}
