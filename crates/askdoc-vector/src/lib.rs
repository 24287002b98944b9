pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

use anyhow::{bail, Result};
use std::sync::Arc;

use askdoc_core::config::Settings;
use askdoc_core::traits::IndexService;

pub use lance::LanceIndexService;
pub use memory::MemoryIndexService;

/// Build the index backend named by `index.backend`.
pub fn index_service_from_settings(settings: &Settings) -> Result<Arc<dyn IndexService>> {
	match settings.index.backend.as_str() {
		"lancedb" | "lance" => Ok(Arc::new(LanceIndexService::open(&settings.index_uri())?)),
		"memory" => Ok(Arc::new(MemoryIndexService::new())),
		other => bail!("unknown index backend '{other}'"),
	}
}
