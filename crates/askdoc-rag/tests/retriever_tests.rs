use std::sync::Arc;

use askdoc_core::traits::{Embedder, IndexService};
use askdoc_core::types::{EmbeddingRecord, IndexSpec, Meta, Metric, ScoredChunk};
use askdoc_core::Error;
use askdoc_embed::HashEmbedder;
use askdoc_rag::{IndexManager, Retriever};
use askdoc_vector::MemoryIndexService;

/// Returns a fixed, unsorted set of hits regardless of the query.
struct FixedHits(Vec<(f32, usize)>);

impl IndexService for FixedHits {
    fn list(&self) -> anyhow::Result<Vec<String>> {
        Ok(vec!["fixed".into()])
    }
    fn create(&self, _: &IndexSpec) -> anyhow::Result<()> {
        Ok(())
    }
    fn describe(&self, _: &str) -> anyhow::Result<Option<IndexSpec>> {
        Ok(None)
    }
    fn upsert(&self, _: &str, _: &[EmbeddingRecord]) -> anyhow::Result<()> {
        Ok(())
    }
    fn query(&self, _: &str, _: &[f32], _: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        Ok(self
            .0
            .iter()
            .map(|&(score, ordinal)| ScoredChunk {
                id: format!("d:{ordinal}"),
                content: format!("chunk {ordinal}"),
                metadata: Meta::new(),
                ordinal,
                score,
            })
            .collect())
    }
    fn delete(&self, _: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

fn handle(embedder: &dyn Embedder) -> IndexSpec {
    IndexSpec {
        name: "fixed".into(),
        dimension: embedder.dim(),
        metric: Metric::Cosine,
        embedder_id: embedder.id().to_string(),
        content_hash: None,
        created_at: None,
    }
}

#[test]
fn returns_top_k_in_descending_order() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(16));
    let service = Arc::new(FixedHits(vec![(0.3, 3), (0.9, 0), (0.5, 2), (0.7, 1)]));
    let retriever = Retriever::new(service, embedder.clone());

    let result = retriever.retrieve(&handle(embedder.as_ref()), "query", 3).unwrap();
    let scores: Vec<f32> = result.hits.iter().map(|h| h.score).collect();
    assert_eq!(scores, vec![0.9, 0.7, 0.5]);
}

#[test]
fn equal_scores_keep_document_order() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(16));
    let service = Arc::new(FixedHits(vec![(0.5, 4), (0.5, 1), (0.5, 2)]));
    let retriever = Retriever::new(service, embedder.clone());

    let result = retriever.retrieve(&handle(embedder.as_ref()), "query", 3).unwrap();
    let ordinals: Vec<usize> = result.hits.iter().map(|h| h.ordinal).collect();
    assert_eq!(ordinals, vec![1, 2, 4]);
}

#[test]
fn k_larger_than_index_returns_everything() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(32));
    let service: Arc<dyn IndexService> = Arc::new(MemoryIndexService::new());
    let spec = handle(embedder.as_ref());
    service.create(&spec).unwrap();
    let records: Vec<EmbeddingRecord> = ["first passage", "second passage"]
        .iter()
        .enumerate()
        .map(|(i, t)| EmbeddingRecord {
            id: format!("d:{i}"),
            vector: embedder.embed(t).unwrap(),
            content: t.to_string(),
            metadata: Meta::new(),
            ordinal: i,
        })
        .collect();
    service.upsert("fixed", &records).unwrap();

    let result = Retriever::new(service, embedder).retrieve(&spec, "passage", 5).unwrap();
    assert_eq!(result.len(), 2);
}

#[test]
fn zero_k_is_invalid() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(16));
    let retriever = Retriever::new(Arc::new(FixedHits(vec![])), embedder.clone());
    let err = retriever.retrieve(&handle(embedder.as_ref()), "q", 0).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn foreign_embedder_is_rejected_before_querying() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(16));
    let mut spec = handle(embedder.as_ref());
    spec.embedder_id = "openai:text-embedding-3-small:d16".into();
    let err = Retriever::new(Arc::new(FixedHits(vec![(0.9, 0)])), embedder).retrieve(&spec, "q", 1).unwrap_err();
    assert!(matches!(err, Error::EmbeddingFunctionMismatch { .. }));
}

#[test]
fn manager_delete_all_and_exists() {
    let service: Arc<dyn IndexService> = Arc::new(MemoryIndexService::new());
    let manager = IndexManager::new(service);
    manager.create("a", 8, Metric::Cosine, "hash").unwrap();
    manager.create("b", 8, Metric::L2, "hash").unwrap();
    assert!(manager.exists("a").unwrap());
    assert!(matches!(manager.create("c", 0, Metric::Cosine, "hash"), Err(Error::InvalidInput(_))));

    assert_eq!(manager.delete_all().unwrap(), vec!["a".to_string(), "b".to_string()]);
    assert!(!manager.exists("a").unwrap());
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn declared_dimension_must_match_embedder() {
    let service: Arc<dyn IndexService> = Arc::new(MemoryIndexService::new());
    let manager = IndexManager::new(service.clone());
    let embedder = HashEmbedder::new(16);
    let err = manager.get_or_create_and_populate("x", &[], &embedder, 1536, Metric::Cosine).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 1536, actual: 16 }));
    assert!(service.list().unwrap().is_empty());
}
