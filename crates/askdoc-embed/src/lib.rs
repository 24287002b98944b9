pub mod device;
pub mod hash;
pub mod local;
pub mod openai;
pub mod pool;
pub mod tokenize;

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;

use askdoc_core::config::EmbeddingSettings;
use askdoc_core::traits::Embedder;

pub use hash::HashEmbedder;
pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;

/// Build the embedder named by `settings.provider`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the [`HashEmbedder`] regardless of provider.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let provider = if use_fake { "hash" } else { settings.provider.as_str() };
    tracing::info!(provider, model = %settings.model, "selecting embedder");

    match provider {
        "hash" | "fake" => Ok(Arc::new(HashEmbedder::new(settings.dimension))),
        "openai" => Ok(Arc::new(OpenAiEmbedder::from_settings(settings)?)),
        "local" | "bge-m3" => {
            let dir = settings.model_dir.as_deref().map(askdoc_core::config::expand_path);
            let embedder = LocalEmbedder::new(dir.as_ref().map(PathBuf::as_path))?;
            if settings.dimension != embedder.dim() {
                bail!(
                    "embedding.dimension is {} but the local model produces {}",
                    settings.dimension,
                    embedder.dim()
                );
            }
            Ok(Arc::new(embedder))
        }
        other => bail!("unknown embedding provider '{other}'"),
    }
}
