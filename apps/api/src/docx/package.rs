//! OPC package access: the zip container that holds a document's parts.
//!
//! Every part is read into memory up front so that a failed merge never
//! leaves a half-written archive behind. Parts are written back in their
//! original order.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::xml;
use crate::docx::DocxError;

const ROOT_RELS: &str = "_rels/.rels";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL_SUFFIX: &str = "/officeDocument";

/// Caps on inflated sizes. Uploads are bounded compressed; these bound what
/// a small archive may expand to in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: 64 * 1024 * 1024,
            max_total_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    pub fn read(bytes: &[u8]) -> Result<Self, DocxError> {
        Self::read_with_limits(bytes, ReadLimits::default())
    }

    /// Reads every part, refusing archives that inflate past `limits`.
    /// Declared sizes are not trusted.
    pub fn read_with_limits(bytes: &[u8], limits: ReadLimits) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let name = file.name().to_string();
            let budget = limits
                .max_part_bytes
                .min(limits.max_total_bytes.saturating_sub(total));

            let mut data = Vec::with_capacity(file.size().min(budget) as usize);
            (&mut file).take(budget + 1).read_to_end(&mut data)?;

            let size = data.len() as u64;
            if size > limits.max_part_bytes {
                return Err(DocxError::Malformed {
                    part: name,
                    reason: format!("part inflates beyond {} bytes", limits.max_part_bytes),
                });
            }
            total += size;
            if total > limits.max_total_bytes {
                return Err(DocxError::Malformed {
                    part: name,
                    reason: format!("package inflates beyond {} bytes", limits.max_total_bytes),
                });
            }

            parts.push(Part {
                name,
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Locates the main document part through the root relationships,
    /// falling back to the conventional location when `_rels/.rels` is absent.
    pub fn main_document_name(&self) -> Result<String, DocxError> {
        let Some(rels) = self.part(ROOT_RELS) else {
            return Ok(DEFAULT_MAIN_PART.to_string());
        };

        let doc = xml::parse(&rels.data).map_err(|e| DocxError::Xml {
            part: ROOT_RELS.to_string(),
            message: e.to_string(),
        })?;

        let target = doc
            .root
            .child_elements()
            .filter(|el| el.local_name() == "Relationship")
            .filter(|el| el.attribute("TargetMode") != Some("External"))
            .find(|el| {
                el.attribute("Type")
                    .is_some_and(|t| t.ends_with(OFFICE_DOCUMENT_REL_SUFFIX))
            })
            .and_then(|el| el.attribute("Target"))
            .ok_or_else(|| DocxError::Malformed {
                part: ROOT_RELS.to_string(),
                reason: "no officeDocument relationship".to_string(),
            })?;

        Ok(target.trim_start_matches('/').to_string())
    }

    /// Writes the package, substituting `replacement` for the part named `name`.
    pub fn write_with(&self, name: &str, replacement: &[u8]) -> Result<Vec<u8>, DocxError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for part in &self.parts {
            let options = SimpleFileOptions::default().compression_method(output_method(part.compression));
            if part.is_dir {
                writer.add_directory(part.name.as_str(), options)?;
                continue;
            }
            writer.start_file(part.name.as_str(), options)?;
            if part.name == name {
                writer.write_all(replacement)?;
            } else {
                writer.write_all(&part.data)?;
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Stored parts stay stored; anything else is re-deflated since that is the
/// only codec compiled in.
fn output_method(original: CompressionMethod) -> CompressionMethod {
    match original {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}
