//! The DOCX container: a ZIP package whose main part is WordprocessingML.

mod document;
mod package;
mod xml;

pub use document::{Document, Paragraph, ParagraphMut};
pub use package::{DOCX_MIME_TYPE, Package};
