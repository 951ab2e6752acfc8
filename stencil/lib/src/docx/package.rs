//! DOCX package handling: the ZIP container around the main document part.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::document::Document;
use crate::error::{LoadError, SerializationError, XmlError};

/// Standard MIME type of a WordprocessingML document.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Package relationships part.
const PACKAGE_RELATIONSHIPS: &str = "_rels/.rels";

/// Where Word puts the main document part.
const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// Suffix shared by the transitional and strict office document relationship types.
const OFFICE_DOCUMENT_RELATIONSHIP: &str = "/officeDocument";

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// A DOCX package loaded fully into memory.
///
/// Every archive entry is kept as raw bytes except the main document part,
/// which is parsed into a [`Document`] and re-encoded on [`Package::to_bytes`].
///
/// ## Examples
///
/// ```no_run
/// use std::path::Path;
/// use stencil_lib::Package;
///
/// let package = Package::open(Path::new("template.docx")).unwrap();
/// for paragraph in package.document().paragraphs() {
///     println!("{}", paragraph.text());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Package {
    entries: Vec<Entry>,
    main_part: usize,
    document: Document,
}

impl Package {
    /// Reads and parses the package at `path`.
    ///
    /// The file is read into memory and closed before parsing starts.
    ///
    /// ## Errors
    ///
    /// Returns [`LoadError`] if the file cannot be read or is not a DOCX package.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parses a package from its serialized bytes.
    ///
    /// ## Errors
    ///
    /// Returns [`LoadError`] if the bytes are not a ZIP archive, the main
    /// document part is missing, or its markup is malformed.
    #[tracing::instrument(skip_all, fields(len = bytes.len()))]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_owned();
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
            file.read_to_end(&mut data)
                .map_err(|source| LoadError::Entry {
                    name: name.clone(),
                    source,
                })?;
            entries.push(Entry {
                name,
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }
        tracing::trace!(entries = entries.len(), "Read archive entries");

        let part = main_part_name(&entries);
        let main_part = entries
            .iter()
            .position(|entry| entry.name == part)
            .ok_or_else(|| LoadError::MissingPart { part: part.clone() })?;

        let xml = std::str::from_utf8(&entries[main_part].data).map_err(|e| LoadError::Xml {
            part: part.clone(),
            source: XmlError::Encoding(e.to_string()),
        })?;
        let document = Document::parse(xml).map_err(|source| LoadError::Xml {
            part: part.clone(),
            source,
        })?;
        tracing::debug!(part = %part, "Parsed main document part");

        Ok(Self {
            entries,
            main_part,
            document,
        })
    }

    /// Name of the main document part inside the archive.
    pub fn main_part_name(&self) -> &str {
        &self.entries[self.main_part].name
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Encodes the package, with the current document, as DOCX bytes.
    ///
    /// Entries are written in their original order with their original
    /// compression method.
    ///
    /// ## Errors
    ///
    /// Returns [`SerializationError`] if the document or archive cannot be written.
    #[tracing::instrument(skip_all)]
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for (index, entry) in self.entries.iter().enumerate() {
            let options = SimpleFileOptions::default().compression_method(entry.compression);
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }

            writer.start_file(entry.name.as_str(), options)?;
            if index == self.main_part {
                writer.write_all(&self.document.to_xml()?)?;
            } else {
                writer.write_all(&entry.data)?;
            }
        }

        let bytes = writer.finish()?.into_inner();
        tracing::debug!(len = bytes.len(), "Encoded package");
        Ok(bytes)
    }
}

/// Resolves the main document part from the package relationships.
fn main_part_name(entries: &[Entry]) -> String {
    entries
        .iter()
        .find(|entry| entry.name == PACKAGE_RELATIONSHIPS)
        .and_then(|entry| std::str::from_utf8(&entry.data).ok())
        .and_then(office_document_target)
        .unwrap_or_else(|| DEFAULT_MAIN_PART.to_owned())
}

/// Target of the office document relationship in a `.rels` part.
fn office_document_target(rels: &str) -> Option<String> {
    let mut reader = Reader::from_str(rels);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element) | Event::Empty(element))
                if element.local_name().as_ref() == b"Relationship" =>
            {
                let mut kind = None;
                let mut target = None;
                for attr in element.attributes().flatten() {
                    let value = attr.unescape_value().ok()?.into_owned();
                    match attr.key.as_ref() {
                        b"Type" => kind = Some(value),
                        b"Target" => target = Some(value),
                        _ => {}
                    }
                }
                if kind.is_some_and(|kind| kind.ends_with(OFFICE_DOCUMENT_RELATIONSHIP)) {
                    return target.map(|target| target.trim_start_matches('/').to_owned());
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DocxBuilder;

    #[test]
    fn from_bytes_finds_main_part_through_relationships() {
        let bytes = DocxBuilder::new().paragraph(["Hello"]).build();
        let package = Package::from_bytes(&bytes).unwrap();
        assert_eq!(package.main_part_name(), "word/document.xml");
        assert_eq!(package.document().paragraphs()[0].text(), "Hello");
    }

    #[test]
    fn office_document_target_strips_leading_slash() {
        let rels = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/word/main.xml"/>
</Relationships>"#;
        assert_eq!(office_document_target(rels).as_deref(), Some("word/main.xml"));
    }

    #[test]
    fn missing_relationships_fall_back_to_default_part() {
        assert_eq!(main_part_name(&[]), DEFAULT_MAIN_PART);
    }

    #[test]
    fn garbage_is_an_archive_error() {
        let result = Package::from_bytes(b"definitely not a zip file");
        assert!(matches!(result, Err(LoadError::Archive(_))));
    }

    #[test]
    fn archive_without_document_is_missing_part() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("readme.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hi").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let result = Package::from_bytes(&bytes);
        assert!(matches!(result, Err(LoadError::MissingPart { part }) if part == DEFAULT_MAIN_PART));
    }

    #[test]
    fn malformed_document_is_an_xml_error() {
        let bytes = DocxBuilder::new().raw_document("<w:document><w:body>").build();
        let result = Package::from_bytes(&bytes);
        assert!(matches!(result, Err(LoadError::Xml { .. })));
    }

    #[test]
    fn open_reports_missing_file() {
        let result = Package::open(Path::new("/nonexistent/path/template.docx"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn to_bytes_keeps_every_entry_in_order() {
        let bytes = DocxBuilder::new().paragraph(["Keep"]).build();
        let package = Package::from_bytes(&bytes).unwrap();
        let written = package.to_bytes().unwrap();

        let original = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let rewritten = ZipArchive::new(Cursor::new(written.clone())).unwrap();
        let names = |archive: &ZipArchive<Cursor<Vec<u8>>>| {
            let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
            names.sort();
            names
        };
        assert_eq!(names(&original), names(&rewritten));

        let reparsed = Package::from_bytes(&written).unwrap();
        assert_eq!(reparsed.document().paragraphs()[0].text(), "Keep");
    }
}
