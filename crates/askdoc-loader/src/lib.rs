//! askdoc-loader
//!
//! Text extraction for the document formats the pipeline accepts. Each format
//! is a [`DocumentLoader`](askdoc_core::traits::DocumentLoader) registered by
//! extension in [`default_registry`].

pub mod docx;
pub mod pdf;

use std::sync::Arc;

use askdoc_core::loader::LoaderRegistry;

pub use docx::DocxLoader;
pub use pdf::PdfLoader;

/// Registry with `.pdf` and `.docx` support.
pub fn default_registry() -> LoaderRegistry {
    LoaderRegistry::new()
        .with("pdf", Arc::new(PdfLoader))
        .with("docx", Arc::new(DocxLoader))
}
