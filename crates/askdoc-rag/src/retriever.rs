use std::sync::Arc;

use askdoc_core::traits::{Embedder, IndexService};
use askdoc_core::types::{IndexHandle, QueryResult};
use askdoc_core::{Error, Result};

/// Embeds a query and asks the index for its nearest chunks.
pub struct Retriever {
    service: Arc<dyn IndexService>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(service: Arc<dyn IndexService>, embedder: Arc<dyn Embedder>) -> Self {
        Self { service, embedder }
    }

    /// Top `k` chunks of `handle` for `query`, best first; equal scores keep document order.
    pub fn retrieve(&self, handle: &IndexHandle, query: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be at least 1".into()));
        }
        if self.embedder.id() != handle.embedder_id {
            return Err(Error::EmbeddingFunctionMismatch {
                index: handle.name.clone(),
                indexed_with: handle.embedder_id.clone(),
                querying_with: self.embedder.id().to_string(),
            });
        }
        let vector = self.embedder.embed(query).map_err(Error::EmbeddingFailure)?;
        if vector.len() != handle.dimension {
            return Err(Error::DimensionMismatch { expected: handle.dimension, actual: vector.len() });
        }

        let mut hits = self.service.query(&handle.name, &vector, k).map_err(Error::RetrievalFailure)?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
        hits.truncate(k);
        tracing::debug!(index = %handle.name, k, hits = hits.len(), top = hits.first().map(|h| h.score), "retrieved");
        Ok(QueryResult::new(hits))
    }
}
