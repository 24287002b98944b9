//! Lifecycle of named similarity indexes: existence, creation, deletion and
//! the one-shot create-or-reuse population pass.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use askdoc_core::traits::{Embedder, IndexService};
use askdoc_core::types::{Chunk, EmbeddingRecord, IndexHandle, IndexSpec, Metric};
use askdoc_core::{Error, Result};

const DEFAULT_EMBED_BATCH: usize = 64;

/// Outcome of [`IndexManager::get_or_create_and_populate`].
#[derive(Debug, Clone)]
pub struct Population {
    pub handle: IndexHandle,
    /// True when an existing index was reused and nothing was embedded.
    pub reused: bool,
    /// Records submitted in this pass.
    pub records: usize,
}

pub struct IndexManager {
    service: Arc<dyn IndexService>,
    embed_batch: usize,
}

fn unavailable(e: anyhow::Error) -> Error {
    Error::IndexServiceUnavailable(e)
}

/// blake3 over the chunk texts, in order, NUL separated.
pub fn content_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = blake3::Hasher::new();
    for c in chunks {
        hasher.update(c.content.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

impl IndexManager {
    pub fn new(service: Arc<dyn IndexService>) -> Self {
        Self { service, embed_batch: DEFAULT_EMBED_BATCH }
    }

    pub fn with_embed_batch(mut self, batch: usize) -> Self {
        self.embed_batch = batch.max(1);
        self
    }

    pub fn service(&self) -> &Arc<dyn IndexService> {
        &self.service
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.open(name)?.is_some())
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.service.list().map_err(unavailable)
    }

    /// Handle of an existing index, as recorded at creation.
    pub fn open(&self, name: &str) -> Result<Option<IndexHandle>> {
        self.service.describe(name).map_err(unavailable)
    }

    pub fn create(&self, name: &str, dimension: usize, metric: Metric, embedder_id: &str) -> Result<IndexHandle> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("index name must not be empty".into()));
        }
        if dimension == 0 {
            return Err(Error::InvalidInput("index dimension must be greater than zero".into()));
        }
        let spec = IndexSpec {
            name: name.to_string(),
            dimension,
            metric,
            embedder_id: embedder_id.to_string(),
            content_hash: None,
            created_at: Some(Utc::now()),
        };
        self.create_spec(&spec)?;
        Ok(spec)
    }

    fn create_spec(&self, spec: &IndexSpec) -> Result<()> {
        self.service.create(spec).map_err(unavailable)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.service.delete(name).map_err(unavailable)
    }

    /// Delete every index the service reports; returns the deleted names.
    pub fn delete_all(&self) -> Result<Vec<String>> {
        let names = self.list()?;
        for name in &names {
            self.delete(name)?;
        }
        if !names.is_empty() {
            tracing::info!(count = names.len(), "cleared existing indexes");
        }
        Ok(names)
    }

    /// Reuse `name` if it exists, otherwise create it and embed + upsert every chunk.
    ///
    /// A failure after creation deletes the new index again.
    pub fn get_or_create_and_populate(
        &self,
        name: &str,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
        dimension: usize,
        metric: Metric,
    ) -> Result<Population> {
        if embedder.dim() != dimension {
            return Err(Error::DimensionMismatch { expected: dimension, actual: embedder.dim() });
        }
        let fingerprint = content_fingerprint(chunks);

        if let Some(existing) = self.open(name)? {
            return self.reuse(existing, &fingerprint, embedder, dimension);
        }

        let spec = IndexSpec {
            name: name.to_string(),
            dimension,
            metric,
            embedder_id: embedder.id().to_string(),
            content_hash: Some(fingerprint),
            created_at: Some(Utc::now()),
        };
        self.create_spec(&spec)?;
        tracing::info!(index = name, dimension, %metric, chunks = chunks.len(), "created index, populating");

        match self.populate(&spec, chunks, embedder) {
            Ok(records) => Ok(Population { handle: spec, reused: false, records }),
            Err(err) => {
                tracing::warn!(index = name, error = %err, "population failed, deleting partial index");
                if let Err(cleanup) = self.service.delete(name) {
                    tracing::warn!(index = name, error = %cleanup, "rollback delete failed");
                }
                Err(err)
            }
        }
    }

    fn reuse(&self, existing: IndexSpec, fingerprint: &str, embedder: &dyn Embedder, dimension: usize) -> Result<Population> {
        if existing.dimension != dimension {
            return Err(Error::DimensionMismatch { expected: existing.dimension, actual: dimension });
        }
        if existing.embedder_id != embedder.id() {
            return Err(Error::EmbeddingFunctionMismatch {
                index: existing.name,
                indexed_with: existing.embedder_id,
                querying_with: embedder.id().to_string(),
            });
        }
        match existing.content_hash.as_deref() {
            Some(recorded) if recorded != fingerprint => {
                tracing::warn!(index = %existing.name, "reusing index built from different content")
            }
            None => tracing::warn!(index = %existing.name, "reusing index without a content fingerprint"),
            _ => tracing::info!(index = %existing.name, "reusing existing index"),
        }
        Ok(Population { handle: existing, reused: true, records: 0 })
    }

    fn populate(&self, spec: &IndexSpec, chunks: &[Chunk], embedder: &dyn Embedder) -> Result<usize> {
        let pb = ProgressBar::new(chunks.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.embed_batch) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = embedder.embed_batch(&texts).map_err(Error::EmbeddingFailure)?;
            if embedded.len() != texts.len() {
                return Err(Error::EmbeddingFailure(anyhow::anyhow!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
            pb.inc(batch.len() as u64);
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != spec.dimension) {
            pb.abandon_with_message("dimension mismatch");
            return Err(Error::DimensionMismatch { expected: spec.dimension, actual: bad.len() });
        }

        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(c, vector)| EmbeddingRecord {
                id: c.id.clone(),
                vector,
                content: c.content.clone(),
                metadata: c.metadata.clone(),
                ordinal: c.chunk_index,
            })
            .collect();
        pb.set_message("upserting");
        self.service.upsert(&spec.name, &records).map_err(unavailable)?;
        pb.finish_with_message("indexed");
        tracing::info!(index = %spec.name, records = records.len(), "population complete");
        Ok(records.len())
    }
}
