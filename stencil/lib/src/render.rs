//! Placeholder substitution.
//!
//! Word splits text into runs wherever formatting, spell checking or editing
//! history changes, so `{NAME}` may arrive as `{`, `NAME`, `}` in three runs.
//! Substitution therefore works on the paragraph's combined text. When the
//! text changes, the whole result is written into the first run and every
//! other run is emptied: the run count is preserved, formatting of later
//! runs is lost.

use std::collections::BTreeMap;
use std::path::Path;

use crate::docx::{Document, Package, ParagraphMut};
use crate::error::{SerializationError, TemplateError};
use crate::scan::PLACEHOLDER_PATTERN;

/// Variable name to replacement value. Iteration order is the replacement order.
pub type Bindings = BTreeMap<String, String>;

/// Substitutes placeholders in a piece of text.
///
/// The text is split into literal spans and `{...}` tokens once, up front.
/// Then, for each binding in order, every token naming it (exactly, or after
/// trimming) becomes the value, and every literal `{name}` inside text
/// inserted by an earlier binding is replaced too. Tokens still unbound at the
/// end are removed. Only the tokens present in the original text are ever
/// removed, so removing one can never join its neighbours into a new
/// placeholder.
///
/// ## Examples
///
/// ```
/// use stencil_lib::{Bindings, substitute};
///
/// let mut bindings = Bindings::new();
/// bindings.insert("NAME".to_string(), "Acme Corp".to_string());
///
/// assert_eq!(substitute("Shareholder: {NAME}", &bindings), "Shareholder: Acme Corp");
/// assert_eq!(substitute("Due {DATE} {", &bindings), "Due  {");
/// ```
pub fn substitute(text: &str, bindings: &Bindings) -> String {
    let mut segments = split_tokens(text);

    for (name, value) in bindings {
        let placeholder = format!("{{{name}}}");
        for segment in &mut segments {
            let replacement = match segment {
                Segment::Text(span) => {
                    if span.contains(&placeholder) {
                        *span = span.replace(&placeholder, value);
                    }
                    continue;
                }
                Segment::Token(inner) if names_token(*inner, name) => value.clone(),
                Segment::Token(_) => continue,
            };
            *segment = Segment::Text(replacement);
        }
    }

    segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            // `{ }` is not a placeholder and passes through
            Segment::Token(inner) if inner.trim().is_empty() => format!("{{{inner}}}"),
            Segment::Token(_) => String::new(),
        })
        .collect()
}

/// A piece of paragraph text: literal characters or a `{...}` token with its raw inner text.
#[derive(Debug)]
enum Segment<'a> {
    Text(String),
    Token(&'a str),
}

fn split_tokens(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for captures in PLACEHOLDER_PATTERN.captures_iter(text) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(text[last..whole.start()].to_owned()));
        }
        segments.push(Segment::Token(inner.as_str()));
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_owned()));
    }
    segments
}

fn names_token(inner: &str, name: &str) -> bool {
    inner == name || inner.trim() == name
}

/// Substitutes placeholders in every reachable paragraph of `document`.
///
/// Returns the number of paragraphs whose text changed. Paragraphs without
/// runs, and paragraphs whose text does not change, are left untouched.
pub fn render_document(document: &mut Document, bindings: &Bindings) -> usize {
    let mut rewritten = 0;
    for mut paragraph in document.paragraphs_mut() {
        if render_paragraph(&mut paragraph, bindings) {
            rewritten += 1;
        }
    }
    rewritten
}

fn render_paragraph(paragraph: &mut ParagraphMut<'_>, bindings: &Bindings) -> bool {
    let run_count = paragraph.run_count();
    if run_count == 0 {
        return false;
    }

    let combined = paragraph.text();
    let replaced = substitute(&combined, bindings);
    if replaced == combined {
        return false;
    }

    paragraph.set_run_text(0, &replaced);
    for index in 1..run_count {
        paragraph.set_run_text(index, "");
    }
    tracing::trace!(runs = run_count, "Rewrote paragraph");
    true
}

/// Substitutes placeholders in a loaded package and encodes the result.
///
/// ## Errors
///
/// Returns [`SerializationError`] if the package cannot be encoded.
#[tracing::instrument(skip_all, fields(bindings = bindings.len()))]
pub fn render(mut package: Package, bindings: &Bindings) -> Result<Vec<u8>, SerializationError> {
    let rewritten = render_document(package.document_mut(), bindings);
    tracing::debug!(rewritten, "Substituted placeholders");
    package.to_bytes()
}

/// Loads the package at `path`, substitutes placeholders and encodes the result.
///
/// The file on disk is never modified.
///
/// ## Errors
///
/// Returns [`TemplateError::Load`] if the file is not a readable DOCX package,
/// or [`TemplateError::Serialize`] if the result cannot be encoded.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn render_path(path: &Path, bindings: &Bindings) -> Result<Vec<u8>, TemplateError> {
    let package = Package::open(path)?;
    Ok(render(package, bindings)?)
}

/// Parses serialized package bytes, substitutes placeholders and encodes the result.
///
/// ## Errors
///
/// Same as [`render_path`].
pub fn render_bytes(bytes: &[u8], bindings: &Bindings) -> Result<Vec<u8>, TemplateError> {
    let package = Package::from_bytes(bytes)?;
    Ok(render(package, bindings)?)
}
