use anyhow::{anyhow, bail, Context, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use askdoc_core::traits::IndexService;
use askdoc_core::types::{EmbeddingRecord, IndexSpec, Meta, Metric, ScoredChunk};

use crate::schema::{build_records_schema, META_TABLE};
use crate::table::{delete_meta, ensure_table, get_meta, open_db, set_meta, table_exists};

/// [`IndexService`] backed by an embedded LanceDB database directory.
///
/// Each index is one table; its [`IndexSpec`] lives in the meta table.
/// Calls block on a private runtime, so this must not be used from inside
/// another tokio runtime.
pub struct LanceIndexService {
	rt: Runtime,
	db: Connection,
}

impl LanceIndexService {
	pub fn open(uri: &Path) -> Result<Self> {
		std::fs::create_dir_all(uri).with_context(|| format!("creating {}", uri.display()))?;
		let rt = Runtime::new()?;
		let db = rt.block_on(open_db(uri.to_string_lossy().as_ref()))?;
		tracing::info!(uri = %uri.display(), "opened LanceDB");
		Ok(Self { rt, db })
	}

	async fn spec_of(&self, name: &str) -> Result<Option<IndexSpec>> {
		if !table_exists(&self.db, name).await? {
			return Ok(None);
		}
		let raw = get_meta(&self.db, META_TABLE, name)
			.await?
			.ok_or_else(|| anyhow!("table '{name}' exists but has no recorded spec"))?;
		Ok(Some(serde_json::from_str(&raw)?))
	}

	fn records_to_batch(spec: &IndexSpec, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
		let dim = spec.dimension as i32;
		let mut ids = Vec::with_capacity(records.len());
		let mut contents = Vec::with_capacity(records.len());
		let mut metas = Vec::with_capacity(records.len());
		let mut ordinals = Vec::with_capacity(records.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
		for r in records {
			if r.vector.len() != spec.dimension {
				bail!("record {} has {} dimensions, index '{}' expects {}", r.id, r.vector.len(), spec.name, spec.dimension);
			}
			ids.push(r.id.clone());
			contents.push(r.content.clone());
			metas.push(serde_json::to_string(&r.metadata)?);
			ordinals.push(r.ordinal as i64);
			vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
		}
		Ok(RecordBatch::try_new(
			build_records_schema(dim),
			vec![
				Arc::new(StringArray::from(ids)),
				Arc::new(StringArray::from(contents)),
				Arc::new(StringArray::from(metas)),
				Arc::new(Int64Array::from(ordinals)),
				Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
			],
		)?)
	}
}

fn distance_type(metric: Metric) -> DistanceType {
	match metric {
		Metric::Cosine => DistanceType::Cosine,
		Metric::L2 => DistanceType::L2,
		Metric::Dot => DistanceType::Dot,
	}
}

/// Lance reports distances; callers want higher-is-better.
fn score_from_distance(metric: Metric, distance: f32) -> f32 {
	match metric {
		Metric::Cosine | Metric::Dot => 1.0 - distance,
		Metric::L2 => -distance,
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("{name} column missing"))
}

async fn search_rows(table: &lancedb::Table, spec: &IndexSpec, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
	let mut stream = table
		.vector_search(vector.to_vec())?
		.distance_type(distance_type(spec.metric))
		.limit(limit)
		.execute()
		.await?;
	let mut hits = Vec::new();
	while let Some(batch) = stream.try_next().await? {
		let ids = string_col(&batch, "id")?;
		let contents = string_col(&batch, "content")?;
		let metas = string_col(&batch, "metadata")?;
		let ordinals = batch
			.column_by_name("ordinal")
			.map(|c| c.as_primitive::<arrow_array::types::Int64Type>().clone())
			.ok_or_else(|| anyhow!("ordinal column missing"))?;
		let distances = batch
			.column_by_name("_distance")
			.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
			.ok_or_else(|| anyhow!("_distance column missing"))?;
		for i in 0..batch.num_rows() {
			let id = ids.value(i);
			let metadata: Meta =
				serde_json::from_str(metas.value(i)).with_context(|| format!("corrupt metadata on record {id} in '{}'", spec.name))?;
			hits.push(ScoredChunk {
				id: id.to_string(),
				content: contents.value(i).to_string(),
				metadata,
				ordinal: ordinals.value(i).max(0) as usize,
				score: score_from_distance(spec.metric, distances.value(i)),
			});
		}
	}
	Ok(hits)
}

impl IndexService for LanceIndexService {
	fn list(&self) -> Result<Vec<String>> {
		let mut names = self.rt.block_on(async { self.db.table_names().execute().await })?;
		names.retain(|n| n != META_TABLE);
		Ok(names)
	}

	fn create(&self, spec: &IndexSpec) -> Result<()> {
		self.rt.block_on(async {
			if table_exists(&self.db, &spec.name).await? {
				bail!("index '{}' already exists", spec.name);
			}
			ensure_table(&self.db, &spec.name, build_records_schema(spec.dimension as i32)).await?;
			set_meta(&self.db, META_TABLE, &spec.name, &serde_json::to_string(spec)?).await?;
			tracing::info!(index = %spec.name, dim = spec.dimension, metric = %spec.metric, "created index");
			Ok(())
		})
	}

	fn describe(&self, name: &str) -> Result<Option<IndexSpec>> {
		self.rt.block_on(self.spec_of(name))
	}

	fn upsert(&self, name: &str, records: &[EmbeddingRecord]) -> Result<()> {
		if records.is_empty() {
			return Ok(());
		}
		self.rt.block_on(async {
			let spec = self.spec_of(name).await?.ok_or_else(|| anyhow!("index '{name}' does not exist"))?;
			let batch = Self::records_to_batch(&spec, records)?;
			let schema = batch.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
			let table = self.db.open_table(name).execute().await?;
			let mut mi = table.merge_insert(&["id"]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await?;
			tracing::debug!(index = name, rows = records.len(), "upserted");
			Ok(())
		})
	}

	fn query(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		self.rt.block_on(async {
			let spec = self.spec_of(name).await?.ok_or_else(|| anyhow!("index '{name}' does not exist"))?;
			if vector.len() != spec.dimension {
				bail!("query has {} dimensions, index '{name}' expects {}", vector.len(), spec.dimension);
			}
			let table = self.db.open_table(name).execute().await?;
			let total = table.count_rows(None).await?;
			if k == 0 || total == 0 {
				return Ok(Vec::new());
			}
			// Widen the search until every row tied with the k-th hit is in.
			let mut limit = k.min(total);
			let mut hits = loop {
				let hits = search_rows(&table, &spec, vector, limit).await?;
				let tied_past_k = hits.len() == limit && limit < total && hits.last().map(|h| h.score) == hits.get(k - 1).map(|h| h.score);
				if !tied_past_k {
					break hits;
				}
				limit = (limit * 2).min(total);
			};
			hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
			hits.truncate(k);
			Ok(hits)
		})
	}

	fn delete(&self, name: &str) -> Result<()> {
		self.rt.block_on(async {
			if table_exists(&self.db, name).await? {
				self.db.drop_table(name, &[]).await?;
			}
			delete_meta(&self.db, META_TABLE, name).await?;
			tracing::info!(index = name, "deleted index");
			Ok(())
		})
	}
}
