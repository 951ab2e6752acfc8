//! Testing utilities for building and inspecting DOCX packages.
//!
//! Real templates come out of a word processor; tests need small packages
//! with a known run layout instead. [`DocxBuilder`] writes the minimum set of
//! parts a consumer needs (`[Content_Types].xml`, package relationships and
//! the main document) with each run spelled out explicitly.
//!
//! ```rust
//! use stencil_lib::testing::{DocxBuilder, paragraph_runs};
//!
//! let bytes = DocxBuilder::new()
//!     .paragraph(["Shareholder: {", "NAME", "}"])
//!     .build();
//! assert_eq!(paragraph_runs(&bytes)[0], vec!["Shareholder: {", "NAME", "}"]);
//! ```

use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::escape::escape;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::docx::Package;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_CLOSE: &str = r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#;

/// A block-level node of a generated document.
#[derive(Debug, Clone)]
enum Block {
    Paragraph(Vec<String>),
    Table(Vec<Vec<Cell>>),
}

/// A table cell: paragraphs and nested tables in order.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    blocks: Vec<Block>,
}

impl Cell {
    /// A cell holding one paragraph with the given runs.
    pub fn paragraph<I, S>(runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_paragraph(runs)
    }

    pub fn with_paragraph<I, S>(mut self, runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocks
            .push(Block::Paragraph(runs.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_table(mut self, rows: Vec<Vec<Cell>>) -> Self {
        self.blocks.push(Block::Table(rows));
        self
    }
}

/// Builds a minimal DOCX package in memory.
#[derive(Debug, Clone, Default)]
pub struct DocxBuilder {
    blocks: Vec<Block>,
    raw_document: Option<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a body paragraph; each item becomes one run.
    pub fn paragraph<I, S>(mut self, runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocks
            .push(Block::Paragraph(runs.into_iter().map(Into::into).collect()));
        self
    }

    /// Appends a body table.
    pub fn table(mut self, rows: Vec<Vec<Cell>>) -> Self {
        self.blocks.push(Block::Table(rows));
        self
    }

    /// Uses `xml` verbatim as the main document part.
    pub fn raw_document(mut self, xml: impl Into<String>) -> Self {
        self.raw_document = Some(xml.into());
        self
    }

    /// Markup of the main document part.
    pub fn document_xml(&self) -> String {
        if let Some(raw) = &self.raw_document {
            return raw.clone();
        }
        let mut xml = String::from(DOCUMENT_OPEN);
        write_blocks(&mut xml, &self.blocks);
        xml.push_str(DOCUMENT_CLOSE);
        xml
    }

    /// Serializes the package.
    ///
    /// ## Panics
    ///
    /// Panics if the in-memory archive cannot be written.
    pub fn build(&self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_owned()),
            ("_rels/.rels", PACKAGE_RELS.to_owned()),
            ("word/document.xml", self.document_xml()),
        ];
        for (name, content) in parts {
            writer.start_file(name, options).expect("start archive entry");
            writer
                .write_all(content.as_bytes())
                .expect("write archive entry");
        }
        writer.finish().expect("finish archive").into_inner()
    }

    /// Writes the package to `path`.
    ///
    /// ## Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).expect("write docx fixture");
    }
}

fn write_blocks(xml: &mut String, blocks: &[Block]) {
    for block in blocks {
        match block {
            Block::Paragraph(runs) => {
                xml.push_str("<w:p>");
                for run in runs {
                    xml.push_str(r#"<w:r><w:t xml:space="preserve">"#);
                    xml.push_str(&escape(run.as_str()));
                    xml.push_str("</w:t></w:r>");
                }
                xml.push_str("</w:p>");
            }
            Block::Table(rows) => {
                xml.push_str("<w:tbl>");
                for row in rows {
                    xml.push_str("<w:tr>");
                    for cell in row {
                        xml.push_str("<w:tc>");
                        write_blocks(xml, &cell.blocks);
                        // A cell must end with a paragraph.
                        if !matches!(cell.blocks.last(), Some(Block::Paragraph(_))) {
                            xml.push_str("<w:p/>");
                        }
                        xml.push_str("</w:tc>");
                    }
                    xml.push_str("</w:tr>");
                }
                xml.push_str("</w:tbl>");
            }
        }
    }
}

/// Run texts of every paragraph in a serialized package, in traversal order.
///
/// ## Panics
///
/// Panics if `bytes` is not a loadable package.
pub fn paragraph_runs(bytes: &[u8]) -> Vec<Vec<String>> {
    let package = Package::from_bytes(bytes).expect("load docx");
    package
        .document()
        .paragraphs()
        .iter()
        .map(|paragraph| paragraph.run_texts())
        .collect()
}

/// Logical text of every paragraph in a serialized package.
///
/// ## Panics
///
/// Panics if `bytes` is not a loadable package.
pub fn paragraph_texts(bytes: &[u8]) -> Vec<String> {
    paragraph_runs(bytes)
        .into_iter()
        .map(|runs| runs.concat())
        .collect()
}
