//! LanceDB connection and housekeeping helpers.
//!
//! Opening the database, creating empty tables, and a key/value meta table
//! that records the spec each index was created with.
use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use arrow_schema::Schema;
use chrono::Utc;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await?;
	Ok(())
}

fn key_predicate(key: &str) -> String {
	format!("key = '{}'", key.replace('\'', "''"))
}

pub async fn set_meta(conn: &Connection, table: &str, key: &str, value: &str) -> Result<()> {
	ensure_table(conn, table, build_meta_schema()).await?;
	let t = conn.open_table(table).execute().await?;
	let rb = RecordBatch::try_new(
		build_meta_schema(),
		vec![
			Arc::new(StringArray::from(vec![key.to_string()])),
			Arc::new(StringArray::from(vec![value.to_string()])),
			Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
		],
	)?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
	let mut mi = t.merge_insert(&["key"]);
	mi.when_matched_update_all(None).when_not_matched_insert_all();
	mi.execute(reader).await?;
	Ok(())
}

pub async fn get_meta(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
	if !table_exists(conn, table).await? {
		return Ok(None);
	}
	let t = conn.open_table(table).execute().await?;
	let mut stream = t.query().only_if(key_predicate(key)).execute().await?;
	while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
		if batch.num_rows() == 0 {
			continue;
		}
		let val = batch
			.column_by_name("value")
			.and_then(|c| c.as_any().downcast_ref::<StringArray>())
			.ok_or_else(|| anyhow::anyhow!("meta.value column missing"))?;
		return Ok(Some(val.value(0).to_string()));
	}
	Ok(None)
}

pub async fn delete_meta(conn: &Connection, table: &str, key: &str) -> Result<()> {
	if !table_exists(conn, table).await? {
		return Ok(());
	}
	conn.open_table(table).execute().await?.delete(&key_predicate(key)).await?;
	Ok(())
}
