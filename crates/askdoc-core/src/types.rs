//! Domain types shared by the loader, chunker, index and answer stages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key holding the source path of a page.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the zero-based page number.
pub const META_PAGE: &str = "page";

/// One page (PDF) or section (DOCX) of a loaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub text: String,
    pub metadata: Meta,
}

impl Page {
    pub fn new(text: impl Into<String>, metadata: Meta) -> Self {
        Self { text: text.into(), metadata }
    }
}

/// Raw loaded content, in source order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, pages: Vec<Page>) -> Self {
        Self { path: path.into(), pages }
    }

    /// Stable document identity: the file stem, or `document` when the path has none.
    pub fn doc_id(&self) -> String {
        doc_id_for(&self.path)
    }

    /// True when no page carries anything but whitespace.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }
}

pub fn doc_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// A chunk of a source page that is independently embedded.
///
/// - `id`: `<doc_id>:<chunk_index>`
/// - `chunk_index`/`total_chunks`: position within the whole document
/// - `page_index`: which page of the document the chunk was cut from
/// - `offset`: byte offset of `content` inside that page's text
/// - `metadata`: copy of the page metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub page_index: usize,
    pub offset: usize,
    pub metadata: Meta,
}

/// Similarity function an index was created with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
    Dot,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
            Metric::Dot => "dot",
        };
        f.write_str(name)
    }
}

impl FromStr for Metric {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "l2" | "euclidean" => Ok(Metric::L2),
            "dot" | "dotproduct" => Ok(Metric::Dot),
            other => Err(crate::error::Error::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

/// Configuration of a named external index, as recorded when it was created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    /// Identifier of the embedding function that populates the index.
    pub embedder_id: String,
    /// blake3 over the chunk texts submitted on population.
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A live reference to a populated index.
pub type IndexHandle = IndexSpec;

/// The triple persisted in the external index for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: Meta,
    /// Document order, used to break similarity ties.
    pub ordinal: usize,
}

/// A stored record together with its similarity to a query vector.
///
/// `score` is higher-is-better regardless of the index metric.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub id: ChunkId,
    pub content: String,
    pub metadata: Meta,
    pub ordinal: usize,
    pub score: f32,
}

/// Top-k hits for one query, ordered by descending similarity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub hits: Vec<ScoredChunk>,
}

impl QueryResult {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn top(&self) -> Option<&ScoredChunk> {
        self.hits.first()
    }
}

/// Generated text plus the retrieval it was conditioned on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: QueryResult,
    /// False when the answer is the fixed no-information reply.
    pub generated: bool,
}

/// Token and price accounting for a set of chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CostEstimate {
    pub total_tokens: usize,
    pub estimated_cost: f64,
}
