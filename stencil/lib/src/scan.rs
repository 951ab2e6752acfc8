//! Placeholder discovery.
//!
//! A placeholder is `{name}`: one pair of braces around one or more
//! characters that are not braces. The name is the trimmed inner text and
//! must not be empty. Formatting runs are invisible to the syntax, so a
//! placeholder split across runs is still found.

use std::collections::BTreeSet;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::docx::{Document, Package};
use crate::error::TemplateError;

lazy_static! {
    /// `{` then one or more non-brace characters then `}`.
    pub(crate) static ref PLACEHOLDER_PATTERN: Regex = Regex::new(r"\{([^{}]+)\}").unwrap();
}

/// Separator placed between paragraph texts before matching.
const PARAGRAPH_SEPARATOR: &str = "\n";

/// Returns the distinct placeholder names in a piece of text.
///
/// ## Examples
///
/// ```
/// use stencil_lib::scan_text;
///
/// let names = scan_text("Total: {AMOUNT} due {DATE}, again {AMOUNT}; { } and {A}{B}");
/// let names: Vec<&str> = names.iter().map(String::as_str).collect();
/// assert_eq!(names, ["A", "AMOUNT", "B", "DATE"]);
/// ```
pub fn scan_text(text: &str) -> BTreeSet<String> {
    PLACEHOLDER_PATTERN
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|inner| inner.as_str().trim())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Returns the distinct placeholder names in every reachable paragraph.
///
/// Paragraph texts are joined with a newline in traversal order (body
/// paragraphs, then table cells) and matched as one buffer.
pub fn scan(document: &Document) -> BTreeSet<String> {
    let paragraphs = document.paragraphs();
    let combined = paragraphs
        .iter()
        .map(|paragraph| paragraph.text())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR);

    let names = scan_text(&combined);
    tracing::debug!(
        paragraphs = paragraphs.len(),
        placeholders = names.len(),
        "Scanned document"
    );
    names
}

/// Loads the package at `path` and scans it.
///
/// ## Errors
///
/// Returns [`TemplateError::Load`] if the file is not a readable DOCX package.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn scan_path(path: &Path) -> Result<BTreeSet<String>, TemplateError> {
    let package = Package::open(path)?;
    Ok(scan(package.document()))
}

/// Parses serialized package bytes and scans them.
///
/// ## Errors
///
/// Returns [`TemplateError::Load`] if the bytes are not a DOCX package.
pub fn scan_bytes(bytes: &[u8]) -> Result<BTreeSet<String>, TemplateError> {
    let package = Package::from_bytes(bytes)?;
    Ok(scan(package.document()))
}
