use anyhow::{anyhow, Context, Result};
use std::path::Path;

use askdoc_core::traits::DocumentLoader;
use askdoc_core::types::{Document, Meta, Page, META_PAGE, META_SOURCE};

/// One [`Page`] per PDF page, numbered from zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Document> {
        let pdf = lopdf::Document::load(path).with_context(|| format!("failed to open {}", path.display()))?;
        let source = path.to_string_lossy().to_string();
        let mut pages = Vec::new();
        for (index, page_number) in pdf.get_pages().keys().enumerate() {
            let text = pdf
                .extract_text(&[*page_number])
                .map_err(|e| anyhow!("failed to extract page {page_number}: {e}"))?;
            let mut metadata = Meta::new();
            metadata.insert(META_SOURCE.to_string(), source.clone());
            metadata.insert(META_PAGE.to_string(), index.to_string());
            pages.push(Page::new(text, metadata));
        }
        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted pdf");
        Ok(Document::new(path, pages))
    }
}
