use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use askdoc_core::traits::DocumentLoader;
use askdoc_core::types::{Document, Meta, Page, META_SOURCE};

const BODY_PART: &str = "word/document.xml";

/// Whole `.docx` body as a single [`Page`]; paragraphs are separated by a blank line.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxLoader;

impl DocumentLoader for DocxLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(file).context("not a zip container")?;
        let mut xml = String::new();
        archive
            .by_name(BODY_PART)
            .with_context(|| format!("missing {BODY_PART}"))?
            .read_to_string(&mut xml)?;
        let text = body_text(&xml)?;

        let mut metadata = Meta::new();
        metadata.insert(META_SOURCE.to_string(), path.to_string_lossy().to_string());
        Ok(Document::new(path, vec![Page::new(text, metadata)]))
    }
}

/// Concatenate the `<w:t>` runs of a WordprocessingML body.
pub fn body_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run_text = false;
    loop {
        match reader.read_event().context("malformed document.xml")? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => out.push_str("\n\n"),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_runs_and_separates_paragraphs() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p>
<w:p><w:r><w:t>Fish &amp; chips</w:t><w:tab/><w:t>ok</w:t></w:r></w:p>
</w:body></w:document>"#;
        assert_eq!(body_text(xml).expect("parse"), "Hello world\n\nFish & chips\tok");
    }

    #[test]
    fn empty_body_is_empty_text() {
        let xml = r#"<w:document xmlns:w="x"><w:body></w:body></w:document>"#;
        assert_eq!(body_text(xml).expect("parse"), "");
    }
}
