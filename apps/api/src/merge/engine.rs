//! Template Merge Engine.
//!
//! Flow: load → discover placeholders → substitute → save.
//!
//! The engine is a pure function of its inputs: it builds a fresh document
//! tree per call, performs no I/O, and returns either a complete document or
//! an error.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{debug, info};

use crate::docx::model::Paragraph;
use crate::docx::{self, DocxError, TemplateDocument};
use crate::merge::placeholder::{placeholder_names, tokenize, Segment};

/// Placeholder name → replacement text for one merge call.
///
/// A `BTreeMap` so that iteration, and therefore logging, is deterministic.
pub type ReplacementMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum MergeError {
    /// The input bytes are not a readable Word document.
    #[error("failed to load template document: {0}")]
    DocumentLoad(#[source] DocxError),

    /// The merged tree could not be serialized.
    #[error("failed to save merged document: {0}")]
    DocumentSave(#[source] DocxError),
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    /// The complete merged `.docx`.
    pub document: Vec<u8>,
    /// Every distinct placeholder name present in the template, matched or not.
    pub placeholders_found: BTreeSet<String>,
    /// One per (paragraph, key) pair whose substitution changed the paragraph.
    pub replacements_applied: usize,
}

/// Merges `replacements` into the document and returns the re-serialized result.
pub fn merge(document_bytes: &[u8], replacements: &ReplacementMap) -> Result<MergeResult, MergeError> {
    let mut doc = docx::load(document_bytes).map_err(MergeError::DocumentLoad)?;

    let placeholders_found = discover_placeholders(&doc);
    info!("Found placeholders: {:?}", placeholders_found);

    let replacements_applied = substitute(&mut doc, replacements);
    info!("Applied {replacements_applied} replacement(s)");

    let document = docx::save(&doc).map_err(MergeError::DocumentSave)?;

    Ok(MergeResult {
        document,
        placeholders_found,
        replacements_applied,
    })
}

/// Distinct placeholder names across body paragraphs and table cell paragraphs.
pub fn discover_placeholders(doc: &TemplateDocument) -> BTreeSet<String> {
    doc.paragraphs()
        .flat_map(|p| {
            placeholder_names(&p.text())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Substitutes placeholders in every paragraph of the document.
/// Returns the number of (paragraph, key) pairs that changed text.
pub fn substitute(doc: &mut TemplateDocument, replacements: &ReplacementMap) -> usize {
    if replacements.is_empty() {
        return 0;
    }

    let mut applied = 0;
    doc.for_each_paragraph_mut(|p| applied += substitute_paragraph(p, replacements));
    applied
}

/// Single pass over the paragraph's original text: inserted values are never
/// re-scanned, and placeholders without a replacement stay literal.
fn substitute_paragraph(paragraph: &mut Paragraph, replacements: &ReplacementMap) -> usize {
    let original = paragraph.text();
    let mut merged = String::with_capacity(original.len());
    let mut changed_keys: BTreeSet<&str> = BTreeSet::new();

    for segment in tokenize(&original) {
        match segment {
            Segment::Literal(text) => merged.push_str(text),
            Segment::Placeholder(placeholder) => match replacements.get(placeholder.name) {
                Some(value) => {
                    if value != placeholder.raw {
                        changed_keys.insert(placeholder.name);
                    }
                    merged.push_str(value);
                }
                None => merged.push_str(placeholder.raw),
            },
        }
    }

    if merged == original {
        return 0;
    }

    debug!(
        "Rewriting paragraph ({} key(s)): {:?} -> {:?}",
        changed_keys.len(),
        original,
        merged
    );
    let applied = changed_keys.len();
    paragraph.set_text(&merged);
    applied
}
