use std::sync::Arc;

use askdoc_core::traits::Generator;
use askdoc_core::types::{Answer, QueryResult};
use askdoc_core::{Error, Result};

/// Reply used when retrieval found nothing; generation is skipped.
pub const NO_INFORMATION_ANSWER: &str = "I don't know. The document does not contain information relevant to this question.";

const SEPARATOR: &str = "\n\n";

/// Chunk texts in rank order joined by a blank line, at most `max_chars` characters.
///
/// Whole chunks are dropped from the tail once the next one would overflow; a
/// top chunk that alone exceeds the bound is cut at a character boundary.
pub fn build_context(result: &QueryResult, max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0usize;
    for (rank, hit) in result.hits.iter().enumerate() {
        let len = hit.content.chars().count();
        if rank == 0 {
            if len > max_chars {
                return hit.content.chars().take(max_chars).collect();
            }
            context.push_str(&hit.content);
            used = len;
            continue;
        }
        let sep = SEPARATOR.chars().count();
        if used + sep + len > max_chars {
            break;
        }
        context.push_str(SEPARATOR);
        context.push_str(&hit.content);
        used += sep + len;
    }
    context
}

pub struct Answerer {
    generator: Arc<dyn Generator>,
    max_context_chars: usize,
}

impl Answerer {
    pub fn new(generator: Arc<dyn Generator>, max_context_chars: usize) -> Self {
        Self { generator, max_context_chars: max_context_chars.max(1) }
    }

    pub fn answer(&self, result: QueryResult, question: &str) -> Result<Answer> {
        if result.is_empty() {
            tracing::info!("no passages retrieved, answering without generation");
            return Ok(Answer { text: NO_INFORMATION_ANSWER.to_string(), sources: result, generated: false });
        }
        let context = build_context(&result, self.max_context_chars);
        tracing::debug!(chars = context.chars().count(), passages = result.len(), "generating answer");
        let text = self.generator.generate(question, &context).map_err(Error::GenerationFailure)?;
        Ok(Answer { text, sources: result, generated: true })
    }
}
