use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use askdoc_core::config::EmbeddingSettings;
use askdoc_core::traits::Embedder;

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    dim: usize,
    batch_size: usize,
    id: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Reads the key from `settings.api_key_env`.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| anyhow!("{} not set", settings.api_key_env))?;
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: &EmbeddingSettings, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("empty API key for {}", settings.model);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            dim: settings.dimension,
            batch_size: settings.batch_size.max(1),
            id: format!("openai:{}:d{}", settings.model, settings.dimension),
        })
    }

    fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        // Only the text-embedding-3 family accepts a reduced output size.
        let dimensions = self.model.starts_with("text-embedding-3").then_some(self.dim);
        let body = EmbeddingRequest { model: &self.model, input, dimensions };
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_else(|_| "Unknown error".to_owned());
            bail!("embedding API error {status}: {text}");
        }
        let mut parsed: EmbeddingResponse = response.json().context("malformed embedding response")?;
        if parsed.data.len() != input.len() {
            bail!("embedding API returned {} vectors for {} inputs", parsed.data.len(), input.len());
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.request(batch)?);
        }
        Ok(out)
    }
}
