//! Stencil library for filling DOCX templates.
//!
//! Templates are ordinary word processing documents containing placeholders
//! written as `{NAME}`. This library discovers the placeholders in a
//! template and produces filled copies, along with the record storage the
//! CLI uses to remember experts and their variables.
//!
//! ## Placeholders
//!
//! - [`scan`] / [`scan_path`] / [`scan_bytes`] - Discover placeholder names
//! - [`render`] / [`render_path`] / [`render_bytes`] - Substitute values and encode a new document
//! - [`substitute`] - The text-level substitution used for each paragraph
//!
//! ## Container
//!
//! - [`Package`] - A DOCX package held in memory
//! - [`Document`] - The parsed main document part with paragraph views
//!
//! ## Record Storage
//!
//! - [`RecordStore`] - Trait for storage backends
//! - [`JsonFileStore`] - JSON file-based storage with file locking
//! - [`Database`] - All records and the operations on them
//!
//! ## Testing
//!
//! - [`testing`] - Builders for small DOCX packages with explicit runs

pub mod docx;
mod error;
mod render;
mod scan;
mod store;
pub mod testing;
mod types;

pub use docx::{DOCX_MIME_TYPE, Document, Package, Paragraph, ParagraphMut};
pub use error::{LoadError, SerializationError, StoreError, TemplateError, XmlError};
pub use render::{Bindings, render, render_bytes, render_document, render_path, substitute};
pub use scan::{scan, scan_bytes, scan_path, scan_text};
pub use store::{Database, JsonFileStore, RecordStore, default_data_dir};
pub use types::{Expert, Expertise, TemplateMeta, Variable};
