//! Error types for the stencil library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing WordprocessingML markup.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The markup is not well-formed.
    #[error("malformed XML at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// Text content could not be decoded as UTF-8.
    #[error("invalid text encoding: {0}")]
    Encoding(String),

    /// An element was closed without being opened, or never closed.
    #[error("unbalanced element `{0}`")]
    Unbalanced(String),

    /// An entity reference that is neither predefined nor a character reference.
    #[error("unknown entity `&{0};`")]
    UnknownEntity(String),

    /// The part has no root element.
    #[error("document has no root element")]
    NoRoot,

    /// Writing the markup back out failed.
    #[error("failed to write XML: {0}")]
    Write(String),
}

/// The input could not be decoded as a DOCX package.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a valid DOCX archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to read archive entry `{name}`: {source}")]
    Entry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("package has no `{part}` part")]
    MissingPart { part: String },

    #[error("failed to parse `{part}`: {source}")]
    Xml {
        part: String,
        #[source]
        source: XmlError,
    },
}

/// The in-memory document could not be encoded back into a DOCX package.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// Errors returned by the path and byte based scan/render entry points.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Serialize(#[from] SerializationError),
}

/// Errors that can occur when working with the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read or write the database file.
    #[error("failed to access store: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or encode the database file.
    #[error("failed to parse store: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to acquire a file lock.
    #[error("failed to acquire lock")]
    Lock,

    /// No expert with the given id exists.
    #[error("no expert with id {0}")]
    UnknownExpert(u64),
}
