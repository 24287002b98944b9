use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Name of the table holding one [`askdoc_core::types::IndexSpec`] per index.
pub const META_TABLE: &str = "_askdoc_indexes";

/// Records table: one row per chunk, `vector` fixed at the index dimension.
pub fn build_records_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("ordinal", DataType::Int64, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
