//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`), and expands `~` and
//! `${VAR}` in user-supplied paths.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::cost::EmbeddingPrice;
use crate::error::{Error, Result};
use crate::types::Metric;

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    /// Layer defaults, `config.toml`, `config.<env>.toml` and `APP_*` variables.
    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name: env_name.to_string() };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 256, overlap: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `openai`, `local` or `hash`.
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub api_base: String,
    pub api_key_env: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub usd_per_1k_tokens: f64,
    /// `cl100k` or `approx`.
    pub tokenizer: String,
    /// Directory holding the local model files (`tokenizer.json`, `config.json`, weights).
    pub model_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            batch_size: 64,
            timeout_secs: 60,
            usd_per_1k_tokens: 0.0004,
            tokenizer: "cl100k".to_string(),
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexSettings {
    /// `lancedb` or `memory`.
    pub backend: String,
    pub uri: String,
    pub name: String,
    pub metric: Metric,
    pub clear_before_ingest: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "lancedb".to_string(),
            uri: "data/indexes/lancedb".to_string(),
            name: "askadocument".to_string(),
            metric: Metric::Cosine,
            clear_before_ingest: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub api_base: String,
    pub api_key_env: String,
    pub max_context_chars: usize,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 1.0,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_context_chars: 12_000,
            timeout_secs: 60,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking_config().validate().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be greater than zero".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be greater than zero".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if self.index.name.trim().is_empty() {
            return Err(Error::InvalidConfig("index.name must not be empty".into()));
        }
        Ok(())
    }

    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig { max_chars: self.chunking.chunk_size, overlap: self.chunking.overlap }
    }

    pub fn embedding_price(&self) -> EmbeddingPrice {
        EmbeddingPrice { usd_per_1k_tokens: self.embedding.usd_per_1k_tokens }
    }

    /// Index location with `~` and environment variables expanded.
    pub fn index_uri(&self) -> PathBuf {
        expand_path(&self.index.uri)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_match_reference_setup() {
        let s = Settings::default();
        assert_eq!(s.chunking.chunk_size, 256);
        assert_eq!(s.chunking.overlap, 0);
        assert_eq!(s.embedding.dimension, 1536);
        assert_eq!(s.index.name, "askadocument");
        assert_eq!(s.index.metric, Metric::Cosine);
        assert_eq!(s.retrieval.top_k, 3);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn env_file_overrides_base_file() {
        let tmp = tempfile::tempdir().expect("tmp");
        fs::write(tmp.path().join("config.toml"), "[chunking]\nchunk_size = 512\n[index]\nname = \"base\"\n").expect("write");
        fs::write(tmp.path().join("config.test.toml"), "[index]\nname = \"under-test\"\nmetric = \"dot\"\n").expect("write");
        let config = Config::load_from(tmp.path(), "test").expect("load");
        let s = config.settings().expect("settings");
        assert_eq!(s.chunking.chunk_size, 512);
        assert_eq!(s.index.name, "under-test");
        assert_eq!(s.index.metric, Metric::Dot);
        assert_eq!(s.retrieval.top_k, 3);
        assert_eq!(config.env_name(), "test");
    }

    #[test]
    fn invalid_chunking_is_rejected() {
        let tmp = tempfile::tempdir().expect("tmp");
        fs::write(tmp.path().join("config.toml"), "[chunking]\nchunk_size = 10\noverlap = 10\n").expect("write");
        assert!(Config::load_from(tmp.path(), "prod").is_err());
    }

    #[test]
    fn expands_env_vars_in_paths() {
        std::env::set_var("ASKDOC_TEST_ROOT", "/srv/askdoc");
        assert_eq!(expand_path("${ASKDOC_TEST_ROOT}/index"), PathBuf::from("/srv/askdoc/index"));
        assert_eq!(expand_path("relative/dir"), PathBuf::from("relative/dir"));
    }
}
