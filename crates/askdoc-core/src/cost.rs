//! Embedding cost accounting.
//!
//! Token counts come from the `cl100k_base` BPE, which is the encoding used
//! by the OpenAI embedding models. [`WordApproxCounter`] is a cheap
//! approximation (`words / 0.75`) for setups without the BPE tables; its
//! counts are estimates only and may drift from what a provider bills.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{Error, Result};
use crate::types::{Chunk, CostEstimate};

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Exact token counter wrapping tiktoken's `cl100k_base` tokenizer.
pub struct Cl100kCounter {
    bpe: Arc<CoreBPE>,
}

impl Cl100kCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::InvalidConfig(format!("failed to load cl100k_base tokenizer: {e}")))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Approximate counter: roughly four tokens per three whitespace-separated words.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordApproxCounter;

impl TokenCounter for WordApproxCounter {
    fn count(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 / 0.75).ceil() as usize
    }
}

/// Price of embedding input, in USD per thousand tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddingPrice {
    pub usd_per_1k_tokens: f64,
}

impl Default for EmbeddingPrice {
    fn default() -> Self {
        Self { usd_per_1k_tokens: 0.0004 }
    }
}

pub struct CostEstimator {
    counter: Box<dyn TokenCounter>,
    price: EmbeddingPrice,
}

impl CostEstimator {
    pub fn new(counter: Box<dyn TokenCounter>, price: EmbeddingPrice) -> Self {
        Self { counter, price }
    }

    /// `cl100k` for exact counts, `approx` for the word-based estimate.
    pub fn from_name(tokenizer: &str, price: EmbeddingPrice) -> Result<Self> {
        let counter: Box<dyn TokenCounter> = match tokenizer {
            "cl100k" | "cl100k_base" => Box::new(Cl100kCounter::new()?),
            "approx" => Box::new(WordApproxCounter),
            other => return Err(Error::InvalidConfig(format!("unknown tokenizer '{other}'"))),
        };
        Ok(Self::new(counter, price))
    }

    pub fn count_tokens(&self, chunks: &[Chunk]) -> usize {
        chunks.iter().map(|c| self.counter.count(&c.content)).sum()
    }

    pub fn cost_of(&self, total_tokens: usize) -> f64 {
        total_tokens as f64 / 1000.0 * self.price.usd_per_1k_tokens
    }

    pub fn estimate(&self, chunks: &[Chunk]) -> CostEstimate {
        let total_tokens = self.count_tokens(chunks);
        CostEstimate { total_tokens, estimated_cost: self.cost_of(total_tokens) }
    }
}

/// Count `chunks` with `cl100k_base` and price them.
pub fn estimate_cost(chunks: &[Chunk], price: EmbeddingPrice) -> Result<CostEstimate> {
    Ok(CostEstimator::new(Box::new(Cl100kCounter::new()?), price).estimate(chunks))
}
