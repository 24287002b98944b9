use anyhow::{anyhow, bail, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use askdoc_core::traits::IndexService;
use askdoc_core::types::{EmbeddingRecord, IndexSpec, Metric, ScoredChunk};

struct MemoryIndex {
	spec: IndexSpec,
	records: HashMap<String, EmbeddingRecord>,
}

/// Process-local [`IndexService`]; exact search, nothing persisted.
#[derive(Default)]
pub struct MemoryIndexService {
	indexes: RwLock<BTreeMap<String, MemoryIndex>>,
}

impl MemoryIndexService {
	pub fn new() -> Self {
		Self::default()
	}
}

fn similarity(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	match metric {
		Metric::Dot => dot,
		Metric::Cosine => {
			let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
			let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
			if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
		}
		Metric::L2 => -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>(),
	}
}

fn poisoned<T>(_: T) -> anyhow::Error {
	anyhow!("memory index lock poisoned")
}

impl IndexService for MemoryIndexService {
	fn list(&self) -> Result<Vec<String>> {
		Ok(self.indexes.read().map_err(poisoned)?.keys().cloned().collect())
	}

	fn create(&self, spec: &IndexSpec) -> Result<()> {
		let mut guard = self.indexes.write().map_err(poisoned)?;
		if guard.contains_key(&spec.name) {
			bail!("index '{}' already exists", spec.name);
		}
		guard.insert(spec.name.clone(), MemoryIndex { spec: spec.clone(), records: HashMap::new() });
		Ok(())
	}

	fn describe(&self, name: &str) -> Result<Option<IndexSpec>> {
		Ok(self.indexes.read().map_err(poisoned)?.get(name).map(|i| i.spec.clone()))
	}

	fn upsert(&self, name: &str, records: &[EmbeddingRecord]) -> Result<()> {
		let mut guard = self.indexes.write().map_err(poisoned)?;
		let index = guard.get_mut(name).ok_or_else(|| anyhow!("index '{name}' does not exist"))?;
		if let Some(bad) = records.iter().find(|r| r.vector.len() != index.spec.dimension) {
			bail!("record {} has {} dimensions, index '{name}' expects {}", bad.id, bad.vector.len(), index.spec.dimension);
		}
		for r in records {
			index.records.insert(r.id.clone(), r.clone());
		}
		Ok(())
	}

	fn query(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		let guard = self.indexes.read().map_err(poisoned)?;
		let index = guard.get(name).ok_or_else(|| anyhow!("index '{name}' does not exist"))?;
		if vector.len() != index.spec.dimension {
			bail!("query has {} dimensions, index '{name}' expects {}", vector.len(), index.spec.dimension);
		}
		let mut hits: Vec<ScoredChunk> = index
			.records
			.values()
			.map(|r| ScoredChunk {
				id: r.id.clone(),
				content: r.content.clone(),
				metadata: r.metadata.clone(),
				ordinal: r.ordinal,
				score: similarity(index.spec.metric, vector, &r.vector),
			})
			.collect();
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
		hits.truncate(k);
		Ok(hits)
	}

	fn delete(&self, name: &str) -> Result<()> {
		self.indexes.write().map_err(poisoned)?.remove(name);
		Ok(())
	}
}
