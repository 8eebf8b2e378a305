//! DOCX codec: just enough of the Office Open XML package to read and
//! rewrite the paragraph/table text of a Word document.
//!
//! `load` builds a [`TemplateDocument`] from uploaded bytes and `save`
//! serializes it back. Parts other than the main document are carried
//! through byte-for-byte.

pub mod model;
pub mod package;
pub mod xml;

#[cfg(test)]
pub(crate) mod fixtures;

use thiserror::Error;

use crate::docx::model::{Block, Paragraph, WordNames};
use crate::docx::package::Package;
use crate::docx::xml::{Attributes, Element, Node, XmlDocument};

const WORDPROCESSING_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const WORDPROCESSING_STRICT_NS: &str = "http://purl.oclc.org/ooxml/wordprocessingml/main";

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a valid zip container: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("package part missing: {0}")]
    MissingPart(String),

    #[error("malformed {part}: {reason}")]
    Malformed { part: String, reason: String },
}

/// The body of the main document part.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub attributes: Attributes,
    pub blocks: Vec<Block>,
}

/// An in-memory Word document: the package, the parsed main part, and the
/// typed body tree the merge engine works on.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    package: Package,
    main_part: String,
    names: WordNames,
    /// The main part with the body element's children moved into `body`.
    xml: XmlDocument,
    body_index: usize,
    pub body: Body,
}

impl PartialEq for TemplateDocument {
    /// Structural equality: same parts, same main-part tree.
    fn eq(&self, other: &Self) -> bool {
        self.main_part == other.main_part
            && self.names == other.names
            && self.xml == other.xml
            && self.body == other.body
            && self.package.part_names().eq(other.package.part_names())
            && self
                .package
                .part_names()
                .filter(|name| *name != self.main_part)
                .all(|name| {
                    self.package.part(name).map(|p| &p.data)
                        == other.package.part(name).map(|p| &p.data)
                })
    }
}

pub fn load(bytes: &[u8]) -> Result<TemplateDocument, DocxError> {
    let package = Package::read(bytes)?;
    let main_part = package.main_document_name()?;

    let part = package
        .part(&main_part)
        .ok_or_else(|| DocxError::MissingPart(main_part.clone()))?;

    let mut xml = xml::parse(&part.data).map_err(|e| DocxError::Xml {
        part: main_part.clone(),
        message: e.to_string(),
    })?;

    let malformed = |reason: &str| DocxError::Malformed {
        part: main_part.clone(),
        reason: reason.to_string(),
    };

    let names = word_names(&xml.root).ok_or_else(|| malformed("root is not a WordprocessingML document"))?;
    if !names.is(&xml.root, "document") {
        return Err(malformed("root element is not <document>"));
    }

    let body_index = xml
        .root
        .children
        .iter()
        .position(|node| matches!(node, Node::Element(el) if names.is(el, "body")))
        .ok_or_else(|| malformed("document has no <body>"))?;

    let Node::Element(body_el) = &mut xml.root.children[body_index] else {
        return Err(malformed("document has no <body>"));
    };
    let attributes = body_el.attributes.clone();
    let children = std::mem::take(&mut body_el.children);
    let blocks = names.blocks_from(children);

    Ok(TemplateDocument {
        package,
        main_part,
        names,
        xml,
        body_index,
        body: Body { attributes, blocks },
    })
}

pub fn save(doc: &TemplateDocument) -> Result<Vec<u8>, DocxError> {
    let mut xml = doc.xml.clone();
    let mut body_el = Element::with_attributes(doc.names.qualify("body"), doc.body.attributes.clone());
    body_el.children = doc.names.blocks_to_nodes(&doc.body.blocks);
    xml.root.children[doc.body_index] = Node::Element(body_el);

    let main_xml = xml::write(&xml).map_err(|e| DocxError::Xml {
        part: doc.main_part.clone(),
        message: e.to_string(),
    })?;

    doc.package.write_with(&doc.main_part, &main_xml)
}

/// Finds the prefix bound to the WordprocessingML main namespace on the root.
fn word_names(root: &Element) -> Option<WordNames> {
    root.attributes.iter().find_map(|(key, value)| {
        if value != WORDPROCESSING_NS && value != WORDPROCESSING_STRICT_NS {
            return None;
        }
        if key == "xmlns" {
            Some(WordNames::new(""))
        } else {
            key.strip_prefix("xmlns:").map(WordNames::new)
        }
    })
}

impl TemplateDocument {
    /// Every text-bearing paragraph in merge order: body paragraphs first,
    /// then for each table its rows, cells, and the cells' own paragraphs.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> + '_ {
        let body = self.body.blocks.iter().filter_map(Block::as_paragraph);
        let cells = self
            .body
            .blocks
            .iter()
            .filter_map(Block::as_table)
            .flat_map(|table| table.rows())
            .flat_map(|row| row.cells())
            .flat_map(|cell| cell.paragraphs());
        body.chain(cells)
    }

    /// Mutable counterpart of [`paragraphs`](Self::paragraphs), same order.
    pub fn for_each_paragraph_mut(&mut self, mut f: impl FnMut(&mut Paragraph)) {
        for block in &mut self.body.blocks {
            if let Block::Paragraph(p) = block {
                f(p);
            }
        }
        for block in &mut self.body.blocks {
            let Block::Table(table) = block else { continue };
            for row in table.rows_mut() {
                for cell in row.cells_mut() {
                    for p in cell.paragraphs_mut() {
                        f(p);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::model::{Inline, RunContent};

    #[test]
    fn test_load_reads_paragraphs_and_tables_in_order() {
        let body = format!(
            "{}{}{}",
            fixtures::paragraph("intro"),
            fixtures::table(&[&["a", "b"], &["c", "d"]]),
            fixtures::paragraph("outro"),
        );
        let doc = load(&fixtures::docx_with_body(&body)).unwrap();

        let texts: Vec<String> = doc.paragraphs().map(Paragraph::text).collect();
        assert_eq!(texts, vec!["intro", "outro", "a", "b", "c", "d"]);
        assert!(matches!(doc.body.blocks.last(), Some(Block::Opaque(el)) if el.name == "w:sectPr"));
    }

    #[test]
    fn test_save_then_load_is_structurally_identical() {
        let body = format!(
            "{}{}",
            r#"<w:p w:rsidR="00AB"><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Bold </w:t></w:r><w:bookmarkStart w:id="0" w:name="x"/><w:r><w:tab/><w:t>tail &amp; more</w:t></w:r></w:p>"#,
            fixtures::table(&[&["cell"]]),
        );
        let original = load(&fixtures::docx_with_body(&body)).unwrap();
        let reloaded = load(&save(&original).unwrap()).unwrap();
        assert_eq!(original, reloaded);
    }

    #[test]
    fn test_load_keeps_opaque_inline_and_run_content() {
        let body = r#"<w:p><w:hyperlink r:id="rId9"><w:r><w:t>link</w:t></w:r></w:hyperlink><w:r><w:br w:type="page"/><w:t>after</w:t></w:r></w:p>"#;
        let doc = load(&fixtures::docx_with_body(body)).unwrap();
        let Block::Paragraph(p) = &doc.body.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(&p.content[0], Inline::Opaque(el) if el.name == "w:hyperlink"));
        let Inline::Run(run) = &p.content[1] else {
            panic!("expected run");
        };
        assert!(matches!(&run.content[0], RunContent::Opaque(el) if el.name == "w:br"));
        assert_eq!(p.text(), "after");
    }

    #[test]
    fn test_nested_tables_are_not_traversed() {
        let inner = fixtures::table(&[&["inner"]]);
        let body = format!(
            r#"<w:tbl><w:tr><w:tc>{}{}</w:tc></w:tr></w:tbl>"#,
            fixtures::paragraph("outer"),
            inner
        );
        let doc = load(&fixtures::docx_with_body(&body)).unwrap();
        let texts: Vec<String> = doc.paragraphs().map(Paragraph::text).collect();
        assert_eq!(texts, vec!["outer"]);
    }

    fn body_elements(bytes: &[u8]) -> Vec<Element> {
        let package = Package::read(bytes).unwrap();
        let xml = xml::parse(&package.part("word/document.xml").unwrap().data).unwrap();
        let body = xml.root.child_elements().find(|el| el.local_name() == "body").unwrap();
        body.child_elements().cloned().collect()
    }

    #[test]
    fn test_untouched_paragraph_keeps_comments_and_text_attributes() {
        let untouched = "<w:p><!--reviewed--><w:r><w:t xml:space=\"preserve\">tight</w:t></w:r>\n</w:p>";
        let body = format!("{untouched}{}", fixtures::paragraph("{x}"));
        let input = fixtures::docx_with_body(&body);

        let mut doc = load(&input).unwrap();
        doc.for_each_paragraph_mut(|p| {
            if p.text() == "{x}" {
                p.set_text("y");
            }
        });
        let output = save(&doc).unwrap();

        let before = body_elements(&input);
        let after = body_elements(&output);
        assert_eq!(before[0], after[0]);
        assert_ne!(before[1], after[1]);
    }

    #[test]
    fn test_load_rejects_oversized_parts() {
        let zeros = vec![b' '; 65 * 1024 * 1024];
        let bytes = fixtures::zip_of(&[("word/document.xml", zeros.as_slice())]);
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, DocxError::Malformed { .. }), "got {err:?}");
    }

    #[test]
    fn test_load_rejects_non_zip_bytes() {
        let err = load(b"definitely not a document").unwrap_err();
        assert!(matches!(err, DocxError::Archive(_)));
    }

    #[test]
    fn test_load_rejects_package_without_main_part() {
        let bytes = fixtures::zip_of(&[("[Content_Types].xml", fixtures::CONTENT_TYPES.as_bytes())]);
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, DocxError::MissingPart(ref name) if name == "word/document.xml"));
    }

    #[test]
    fn test_load_rejects_non_word_xml() {
        let bytes = fixtures::zip_of(&[("word/document.xml", b"<html><body/></html>".as_slice())]);
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, DocxError::Malformed { .. }), "got {err:?}");
    }

    #[test]
    fn test_load_rejects_truncated_xml() {
        let bytes = fixtures::zip_of(&[(
            "word/document.xml",
            br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p>"#.as_slice(),
        )]);
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, DocxError::Xml { .. }), "got {err:?}");
    }

    #[test]
    fn test_default_namespace_documents_are_supported() {
        let xml = format!(
            r#"<document xmlns="{WORDPROCESSING_NS}"><body><p><r><t>plain</t></r></p></body></document>"#
        );
        let bytes = fixtures::zip_of(&[("word/document.xml", xml.as_bytes())]);
        let doc = load(&bytes).unwrap();
        assert_eq!(doc.paragraphs().next().map(Paragraph::text).as_deref(), Some("plain"));
        assert_eq!(load(&save(&doc).unwrap()).unwrap(), doc);
    }
}
