use std::path::Path;

use crate::types::{Document, EmbeddingRecord, IndexSpec, ScoredChunk};

/// Computes fixed-length vectors for text.
///
/// Implementations must be deterministic for identical input and `id()`.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the model/version, recorded on every index it populates.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// External similarity index holding named indexes.
pub trait IndexService: Send + Sync {
    fn list(&self) -> anyhow::Result<Vec<String>>;
    fn create(&self, spec: &IndexSpec) -> anyhow::Result<()>;
    /// The spec recorded at creation, or `None` if the index does not exist.
    fn describe(&self, name: &str) -> anyhow::Result<Option<IndexSpec>>;
    fn upsert(&self, name: &str, records: &[EmbeddingRecord]) -> anyhow::Result<()>;
    /// Up to `k` records ranked by the index's own metric, best first.
    fn query(&self, name: &str, vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredChunk>>;
    fn delete(&self, name: &str) -> anyhow::Result<()>;
}

/// Produces an answer to `question` conditioned on `context`.
pub trait Generator: Send + Sync {
    fn generate(&self, question: &str, context: &str) -> anyhow::Result<String>;
}

/// Extracts text from one file format.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> anyhow::Result<Document>;
}
