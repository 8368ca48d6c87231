use std::io::{Cursor, Read, Write};
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::render::engine::render_part;
use crate::render::{DocumentRenderer, RenderError, TemplateContext};

const MAIN_PART: &str = "word/document.xml";

/// Parts that may carry placeholders. Everything else (styles, media,
/// relationships) is copied byte-for-byte.
fn is_template_part(name: &str) -> bool {
    name == MAIN_PART
        || name == "word/footnotes.xml"
        || name == "word/endnotes.xml"
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

/// A DOCX template held in memory. Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    bytes: Bytes,
}

impl DocxTemplate {
    /// Reads and checks the template file. Called once at startup so a missing
    /// or broken template stops the process before it serves traffic.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read DOCX template at {}", path.display()))?;
        Self::from_bytes(bytes)
            .with_context(|| format!("{} is not a usable DOCX template", path.display()))
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, RenderError> {
        let bytes = bytes.into();
        {
            let mut archive = ZipArchive::new(Cursor::new(&bytes[..]))?;
            if archive.by_name(MAIN_PART).is_err() {
                return Err(RenderError::MissingPart(MAIN_PART));
            }
        }
        Ok(Self { bytes })
    }

    /// Renders every template part and re-packs the archive with DEFLATE.
    pub fn render(&self, context: &TemplateContext) -> Result<Vec<u8>, RenderError> {
        let mut archive = ZipArchive::new(Cursor::new(&self.bytes[..]))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.bytes.len())));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_string();

            if entry.is_dir() {
                writer.add_directory(name, options)?;
                continue;
            }

            let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
            entry.read_to_end(&mut data)?;

            if is_template_part(&name) {
                let xml =
                    String::from_utf8(data).map_err(|_| RenderError::Encoding(name.clone()))?;
                data = render_part(&xml, context)?.into_bytes();
                debug!("Rendered template part {name}");
            }

            writer.start_file(name, options)?;
            writer.write_all(&data)?;
        }

        Ok(writer.finish()?.into_inner())
    }
}

impl DocumentRenderer for DocxTemplate {
    fn render(&self, context: &TemplateContext) -> Result<Vec<u8>, RenderError> {
        DocxTemplate::render(self, context)
    }
}
