//! WordprocessingML main document: paragraphs, tables and runs.
//!
//! Only the structure relevant to placeholders is interpreted. A paragraph
//! is a `w:p` element and its runs are its direct `w:r` children. Paragraphs
//! are reached from the body and, recursively, from table cells.

use crate::docx::xml::{Element, Node, XmlDocument};
use crate::error::XmlError;

/// Namespace of the main WordprocessingML vocabulary.
const WORDML_NAMESPACE: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Namespace used by Strict Open XML documents.
const WORDML_STRICT_NAMESPACE: &str = "http://purl.oclc.org/ooxml/wordprocessingml/main";

/// Prefix Word itself writes for the main namespace.
const DEFAULT_PREFIX: &str = "w";

/// Qualified element names for the prefix bound to the WordprocessingML namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WordNames {
    body: String,
    paragraph: String,
    run: String,
    text: String,
    tab: String,
    br: String,
    cr: String,
    no_break_hyphen: String,
    table: String,
    row: String,
    cell: String,
    break_type: String,
}

impl WordNames {
    fn with_prefix(prefix: Option<&str>) -> Self {
        let qualify = |local: &str| match prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_owned(),
        };
        Self {
            body: qualify("body"),
            paragraph: qualify("p"),
            run: qualify("r"),
            text: qualify("t"),
            tab: qualify("tab"),
            br: qualify("br"),
            cr: qualify("cr"),
            no_break_hyphen: qualify("noBreakHyphen"),
            table: qualify("tbl"),
            row: qualify("tr"),
            cell: qualify("tc"),
            break_type: qualify("type"),
        }
    }

    /// Finds the prefix the root element binds to the WordprocessingML namespace.
    fn detect(root: &Element) -> Self {
        for attr in root.start.attributes().flatten() {
            let key = attr.key.as_ref();
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            if value != WORDML_NAMESPACE && value != WORDML_STRICT_NAMESPACE {
                continue;
            }
            if key == b"xmlns" {
                return Self::with_prefix(None);
            }
            if let Some(prefix) = key.strip_prefix(b"xmlns:")
                && let Ok(prefix) = std::str::from_utf8(prefix)
            {
                return Self::with_prefix(Some(prefix));
            }
        }
        Self::with_prefix(Some(DEFAULT_PREFIX))
    }

    fn is_line_break(&self, element: &Element) -> bool {
        if element.is(&self.cr) {
            return true;
        }
        element.is(&self.br)
            && matches!(
                element.attribute(&self.break_type).as_deref(),
                None | Some("textWrapping")
            )
    }

    /// Children of a run that contribute to its text.
    fn is_text_content(&self, element: &Element) -> bool {
        element.is(&self.text)
            || element.is(&self.tab)
            || element.is(&self.no_break_hyphen)
            || self.is_line_break(element)
    }
}

/// The parsed main document part of a DOCX package.
#[derive(Debug, Clone)]
pub struct Document {
    xml: XmlDocument,
    names: WordNames,
}

impl Document {
    /// Parses the markup of a main document part.
    ///
    /// ## Errors
    ///
    /// Returns an error if the markup is not well-formed.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let xml = XmlDocument::parse(xml)?;
        let names = xml
            .root()
            .map(WordNames::detect)
            .unwrap_or_else(|| WordNames::with_prefix(Some(DEFAULT_PREFIX)));
        Ok(Self { xml, names })
    }

    /// Serializes the document back to markup.
    ///
    /// ## Errors
    ///
    /// Returns an error if writing fails.
    pub fn to_xml(&self) -> Result<Vec<u8>, XmlError> {
        self.xml.to_bytes()
    }

    /// Every reachable paragraph in document order.
    ///
    /// Body paragraphs come first, then the paragraphs of each body table.
    /// Inside a cell, the cell's own paragraphs precede those of tables nested
    /// in it.
    pub fn paragraphs(&self) -> Vec<Paragraph<'_>> {
        let names = &self.names;
        let Some(body) = self.body() else {
            return Vec::new();
        };

        let mut elements = Vec::new();
        let mut tables = Vec::new();
        for child in body.child_elements() {
            if child.is(&names.paragraph) {
                elements.push(child);
            } else if child.is(&names.table) {
                tables.push(child);
            }
        }
        for table in tables {
            collect_table(table, names, &mut elements);
        }

        elements
            .into_iter()
            .map(|element| Paragraph { element, names })
            .collect()
    }

    /// Mutable views over the same paragraphs, in the same order as [`Document::paragraphs`].
    pub fn paragraphs_mut(&mut self) -> Vec<ParagraphMut<'_>> {
        let names = &self.names;
        let Some(body) = body_mut(&mut self.xml, names) else {
            return Vec::new();
        };

        let mut elements = Vec::new();
        let mut tables = Vec::new();
        for child in body.child_elements_mut() {
            if child.is(&names.paragraph) {
                elements.push(child);
            } else if child.is(&names.table) {
                tables.push(child);
            }
        }
        for table in tables {
            collect_table_mut(table, names, &mut elements);
        }

        elements
            .into_iter()
            .map(|element| ParagraphMut { element, names })
            .collect()
    }

    fn body(&self) -> Option<&Element> {
        self.xml
            .root()?
            .child_elements()
            .find(|child| child.is(&self.names.body))
    }
}

fn body_mut<'a>(xml: &'a mut XmlDocument, names: &WordNames) -> Option<&'a mut Element> {
    xml.root_mut()?
        .child_elements_mut()
        .find(|child| child.is(&names.body))
}

fn collect_table<'a>(table: &'a Element, names: &WordNames, out: &mut Vec<&'a Element>) {
    for row in table.child_elements().filter(|e| e.is(&names.row)) {
        for cell in row.child_elements().filter(|e| e.is(&names.cell)) {
            let mut nested = Vec::new();
            for child in cell.child_elements() {
                if child.is(&names.paragraph) {
                    out.push(child);
                } else if child.is(&names.table) {
                    nested.push(child);
                }
            }
            for table in nested {
                collect_table(table, names, out);
            }
        }
    }
}

fn collect_table_mut<'a>(
    table: &'a mut Element,
    names: &WordNames,
    out: &mut Vec<&'a mut Element>,
) {
    for row in table.child_elements_mut().filter(|e| e.is(&names.row)) {
        for cell in row.child_elements_mut().filter(|e| e.is(&names.cell)) {
            let mut nested = Vec::new();
            for child in cell.child_elements_mut() {
                if child.is(&names.paragraph) {
                    out.push(child);
                } else if child.is(&names.table) {
                    nested.push(child);
                }
            }
            for table in nested {
                collect_table_mut(table, names, out);
            }
        }
    }
}

/// Read-only view of a paragraph.
#[derive(Debug, Clone, Copy)]
pub struct Paragraph<'a> {
    element: &'a Element,
    names: &'a WordNames,
}

impl Paragraph<'_> {
    pub fn run_count(&self) -> usize {
        runs(self.element, self.names).count()
    }

    /// Text of each run, in run order.
    pub fn run_texts(&self) -> Vec<String> {
        runs(self.element, self.names)
            .map(|run| run_text(run, self.names))
            .collect()
    }

    /// Logical text: the concatenation of every run's text.
    pub fn text(&self) -> String {
        self.run_texts().concat()
    }
}

/// Mutable view of a paragraph.
#[derive(Debug)]
pub struct ParagraphMut<'a> {
    element: &'a mut Element,
    names: &'a WordNames,
}

impl ParagraphMut<'_> {
    pub fn run_count(&self) -> usize {
        runs(self.element, self.names).count()
    }

    pub fn run_texts(&self) -> Vec<String> {
        runs(self.element, self.names)
            .map(|run| run_text(run, self.names))
            .collect()
    }

    pub fn text(&self) -> String {
        self.run_texts().concat()
    }

    /// Replaces the text of the run at `index`.
    ///
    /// Text-bearing children of the run are removed and the new text is
    /// inserted where the first of them stood. Run properties and non-text
    /// content stay in place. Returns `false` if there is no such run.
    pub fn set_run_text(&mut self, index: usize, text: &str) -> bool {
        let names = self.names;
        let Some(run) = self
            .element
            .child_elements_mut()
            .filter(|e| e.is(&names.run))
            .nth(index)
        else {
            return false;
        };

        let is_content = |node: &Node| matches!(node, Node::Element(e) if names.is_text_content(e));
        let at = run
            .children
            .iter()
            .position(is_content)
            .unwrap_or(run.children.len());
        run.children.retain(|node| !is_content(node));
        let tail = run.children.split_off(at);
        run.children.extend(encode_run_text(text, names));
        run.children.extend(tail);
        true
    }
}

fn runs<'a>(paragraph: &'a Element, names: &'a WordNames) -> impl Iterator<Item = &'a Element> {
    paragraph
        .child_elements()
        .filter(move |child| child.is(&names.run))
}

fn run_text(run: &Element, names: &WordNames) -> String {
    let mut text = String::new();
    for child in run.child_elements() {
        if child.is(&names.text) {
            text.push_str(&child.text());
        } else if child.is(&names.tab) {
            text.push('\t');
        } else if child.is(&names.no_break_hyphen) {
            text.push('-');
        } else if names.is_line_break(child) {
            text.push('\n');
        }
    }
    text
}

/// Encodes a string as run content: text chunks, tabs and line breaks.
fn encode_run_text(text: &str, names: &WordNames) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut pending = String::new();

    let flush = |pending: &mut String, nodes: &mut Vec<Node>| {
        if pending.is_empty() {
            return;
        }
        let mut element = Element::with_text(&names.text, std::mem::take(pending));
        element.set_attribute("xml:space", "preserve");
        nodes.push(Node::Element(element));
    };

    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut pending, &mut nodes);
                nodes.push(Node::Element(Element::new(&names.tab)));
            }
            '\n' => {
                flush(&mut pending, &mut nodes);
                nodes.push(Node::Element(Element::new(&names.br)));
            }
            _ => pending.push(ch),
        }
    }
    flush(&mut pending, &mut nodes);
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{WORDML_NAMESPACE}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    #[test]
    fn paragraphs_concatenate_run_text() {
        let doc = Document::parse(&wrap(
            "<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>world</w:t></w:r></w:p>",
        ))
        .unwrap();
        let paragraphs = doc.paragraphs();
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(paragraphs[0].run_count(), 2);
        assert_eq!(paragraphs[0].text(), "Hello world");
    }

    #[test]
    fn tabs_breaks_and_hyphens_are_text() {
        let doc = Document::parse(&wrap(
            r#"<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:noBreakHyphen/><w:br w:type="page"/><w:cr/></w:r></w:p>"#,
        ))
        .unwrap();
        assert_eq!(doc.paragraphs()[0].text(), "a\tb\n-\n");
    }

    #[test]
    fn traversal_visits_body_then_tables_then_nested_tables() {
        let doc = Document::parse(&wrap(concat!(
            "<w:tbl><w:tr><w:tc>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>nested</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p><w:r><w:t>cell</w:t></w:r></w:p>",
            "</w:tc></w:tr></w:tbl>",
            "<w:p><w:r><w:t>body</w:t></w:r></w:p>",
        )))
        .unwrap();
        let texts: Vec<String> = doc.paragraphs().iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["body", "cell", "nested"]);
    }

    #[test]
    fn prefix_is_taken_from_namespace_declaration() {
        let xml = format!(
            r#"<x:document xmlns:x="{WORDML_NAMESPACE}"><x:body><x:p><x:r><x:t>hi</x:t></x:r></x:p></x:body></x:document>"#
        );
        let doc = Document::parse(&xml).unwrap();
        assert_eq!(doc.paragraphs()[0].text(), "hi");
    }

    #[test]
    fn default_namespace_means_unprefixed_names() {
        let xml = format!(
            r#"<document xmlns="{WORDML_NAMESPACE}"><body><p><r><t>plain</t></r></p></body></document>"#
        );
        let doc = Document::parse(&xml).unwrap();
        assert_eq!(doc.paragraphs()[0].text(), "plain");
    }

    #[test]
    fn set_run_text_keeps_properties_and_position() {
        let mut doc = Document::parse(&wrap(
            "<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>old</w:t><w:tab/><w:t>text</w:t><w:drawing/></w:r></w:p>",
        ))
        .unwrap();
        {
            let mut paragraphs = doc.paragraphs_mut();
            assert!(paragraphs[0].set_run_text(0, "new\tvalue"));
            assert!(!paragraphs[0].set_run_text(3, "missing"));
        }
        let xml = String::from_utf8(doc.to_xml().unwrap()).unwrap();
        assert!(xml.contains(concat!(
            r#"<w:r><w:rPr><w:i/></w:rPr>"#,
            r#"<w:t xml:space="preserve">new</w:t><w:tab/><w:t xml:space="preserve">value</w:t>"#,
            r#"<w:drawing/></w:r>"#
        )));
    }

    #[test]
    fn set_run_text_on_run_without_text_appends() {
        let mut doc = Document::parse(&wrap("<w:p><w:r><w:rPr/></w:r></w:p>")).unwrap();
        doc.paragraphs_mut()[0].set_run_text(0, "added");
        assert_eq!(doc.paragraphs()[0].text(), "added");
    }

    #[test]
    fn clearing_a_run_leaves_no_text_content() {
        let mut doc = Document::parse(&wrap(
            r#"<w:p><w:r><w:t>gone</w:t><w:br w:type="page"/></w:r></w:p>"#,
        ))
        .unwrap();
        doc.paragraphs_mut()[0].set_run_text(0, "");
        let xml = String::from_utf8(doc.to_xml().unwrap()).unwrap();
        assert!(xml.contains(r#"<w:r><w:br w:type="page"/></w:r>"#));
    }

    #[test]
    fn document_without_body_has_no_paragraphs() {
        let doc = Document::parse("<w:document/>").unwrap();
        assert!(doc.paragraphs().is_empty());
    }
}
