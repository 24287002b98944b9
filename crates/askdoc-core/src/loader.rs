//! Extension-keyed dispatch over [`DocumentLoader`] implementations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::traits::DocumentLoader;
use crate::types::Document;

#[derive(Default, Clone)]
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self { Self::default() }

    /// Register `loader` for `extension` (with or without the leading dot, any case).
    pub fn register(&mut self, extension: &str, loader: Arc<dyn DocumentLoader>) -> &mut Self {
        self.loaders.insert(normalize(extension), loader);
        self
    }

    pub fn with(mut self, extension: &str, loader: Arc<dyn DocumentLoader>) -> Self {
        self.register(extension, loader);
        self
    }

    /// `UnsupportedFormat` unless a loader is registered for the extension of `path`.
    pub fn ensure_supported(&self, path: &Path) -> Result<()> {
        self.lookup(path).map(|_| ())
    }

    fn lookup(&self, path: &Path) -> Result<&Arc<dyn DocumentLoader>> {
        let extension = path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default();
        self.loaders.get(&normalize(&extension)).ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: if extension.is_empty() { "<none>".to_string() } else { format!(".{extension}") },
        })
    }

    /// Load `path` with the loader registered for its extension.
    pub fn load(&self, path: &Path) -> Result<Document> {
        let loader = self.lookup(path)?;
        tracing::info!(path = %path.display(), "loading document");
        loader.load(path).map_err(|e| Error::Unreadable { path: path.to_path_buf(), reason: format!("{e:#}") })
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Page;

    struct Stub;
    impl DocumentLoader for Stub {
        fn load(&self, path: &Path) -> anyhow::Result<Document> {
            Ok(Document::new(path, vec![Page::new("hello", Default::default())]))
        }
    }

    struct Broken;
    impl DocumentLoader for Broken {
        fn load(&self, _path: &Path) -> anyhow::Result<Document> { anyhow::bail!("corrupt xref table") }
    }

    #[test]
    fn dispatches_by_extension_case_insensitively() {
        let registry = LoaderRegistry::new().with(".PDF", Arc::new(Stub));
        let doc = registry.load(Path::new("/tmp/report.Pdf")).expect("load");
        assert_eq!(doc.pages.len(), 1);
        assert!(registry.ensure_supported(Path::new("scan.pdf")).is_ok());
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let registry = LoaderRegistry::new().with("pdf", Arc::new(Stub));
        let err = registry.load(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension, .. } if extension == ".txt"));
        let err = registry.load(Path::new("README")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn loader_failure_is_unreadable() {
        let registry = LoaderRegistry::new().with("docx", Arc::new(Broken));
        let err = registry.load(Path::new("a.docx")).unwrap_err();
        match err {
            Error::Unreadable { reason, .. } => assert!(reason.contains("corrupt")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
