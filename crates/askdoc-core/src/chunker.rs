//! Recursive, boundary-aware chunking of loaded documents.
//!
//! A page is first cut on paragraph breaks, then lines, sentences, words and
//! finally raw characters. A smaller boundary is only used for a piece the
//! larger one could not bring under `max_chars`. Separators stay attached to
//! the text they terminate, so the page text is always recoverable from the
//! chunk offsets. Runs of pure whitespace are folded into a neighbouring
//! chunk wherever the size limit allows.

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Boundary kinds from largest to smallest; raw characters come last.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length, in characters.
    pub max_chars: usize,
    /// Characters of trailing context repeated at the start of the next chunk.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 256, overlap: 0 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(Error::InvalidInput("max_chunk_size must be greater than zero".into()));
        }
        if self.overlap >= self.max_chars {
            return Err(Error::InvalidInput(format!(
                "overlap ({}) must be smaller than max_chunk_size ({})",
                self.overlap, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Byte range `[start, end)` inside one page's text.
type Span = (usize, usize);

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Split every page of `document` into chunks, in document order.
    ///
    /// Pages without extractable text contribute nothing; a document with
    /// no text at all yields an empty vector.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let doc_id = document.doc_id();
        let doc_path = document.path.to_string_lossy().to_string();
        let mut chunks = Vec::new();
        for (page_index, page) in document.pages.iter().enumerate() {
            for (start, end) in self.split_page(&page.text) {
                let chunk_index = chunks.len();
                chunks.push(Chunk {
                    id: format!("{doc_id}:{chunk_index}"),
                    doc_id: doc_id.clone(),
                    doc_path: doc_path.clone(),
                    content: page.text[start..end].to_string(),
                    chunk_index,
                    total_chunks: 0,
                    page_index,
                    offset: start,
                    metadata: page.metadata.clone(),
                });
            }
        }
        let total_chunks = chunks.len();
        for chunk in &mut chunks { chunk.total_chunks = total_chunks; }
        tracing::debug!(doc_id = %doc_id, pages = document.pages.len(), chunks = total_chunks, "chunked document");
        chunks
    }

    fn split_page(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        if !text.trim().is_empty() {
            self.split_range(text, 0, text.len(), 0, &mut spans);
        }
        absorb_blank_spans(text, spans, self.config.max_chars)
    }

    fn split_range(&self, text: &str, start: usize, end: usize, level: usize, out: &mut Vec<Span>) {
        if char_len(&text[start..end]) <= self.config.max_chars {
            out.push((start, end));
            return;
        }
        let Some(separators) = SEPARATORS.get(level) else {
            self.split_chars(text, start, end, out);
            return;
        };
        let pieces = split_keeping_separators(text, start, end, separators);
        if pieces.len() <= 1 {
            self.split_range(text, start, end, level + 1, out);
        } else {
            self.merge(text, &pieces, level, out);
        }
    }

    /// Greedily pack adjacent pieces into windows of at most `max_chars`.
    fn merge(&self, text: &str, pieces: &[Span], level: usize, out: &mut Vec<Span>) {
        let max = self.config.max_chars;
        // (start, end, chars)
        let mut window: Vec<(usize, usize, usize)> = Vec::new();
        let mut window_chars = 0usize;

        for &(start, end) in pieces {
            let len = char_len(&text[start..end]);
            if len > max {
                // A blank window is split together with the oversized piece.
                let blank_window = !window.is_empty() && window.iter().all(|&(s, e, _)| is_blank(&text[s..e]));
                let from = if blank_window {
                    window[0].0
                } else {
                    flush(&mut window, out);
                    start
                };
                window.clear();
                window_chars = 0;
                self.split_range(text, from, end, level + 1, out);
                continue;
            }
            if window_chars + len > max && !window.is_empty() {
                if let (Some(first), Some(last)) = (window.first(), window.last()) {
                    out.push((first.0, last.1));
                }
                let mut kept = 0usize;
                let mut keep_from = window.len();
                while keep_from > 0 {
                    let chars = window[keep_from - 1].2;
                    if kept + chars > self.config.overlap || kept + chars + len > max { break; }
                    kept += chars;
                    keep_from -= 1;
                }
                window.drain(..keep_from);
                window_chars = kept;
            }
            window.push((start, end, len));
            window_chars += len;
        }
        flush(&mut window, out);
    }

    fn split_chars(&self, text: &str, start: usize, end: usize, out: &mut Vec<Span>) {
        let bounds: Vec<usize> = text[start..end].char_indices().map(|(i, _)| start + i).collect();
        let n = bounds.len();
        let step = self.config.max_chars - self.config.overlap;
        let mut i = 0usize;
        while i < n {
            let j = (i + self.config.max_chars).min(n);
            let span_end = if j == n { end } else { bounds[j] };
            out.push((bounds[i], span_end));
            if j == n { break; }
            i += step;
        }
    }
}

fn flush(window: &mut Vec<(usize, usize, usize)>, out: &mut Vec<Span>) {
    if let (Some(first), Some(last)) = (window.first(), window.last()) {
        out.push((first.0, last.1));
    }
    window.clear();
}

/// Fold whitespace-only spans into a neighbour. A blank run with no room
/// beside the previous span is prepended to the next one, which is re-cut at
/// `max` characters. A trailing run takes the tail of the previous span.
fn absorb_blank_spans(text: &str, spans: Vec<Span>, max: usize) -> Vec<Span> {
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    let mut pending: Option<Span> = None;
    for (mut start, end) in spans {
        if let Some((blank_start, _)) = pending.take() {
            start = start.min(blank_start);
            if char_len(&text[start..end]) > max {
                let cut = advance_chars(text, start, max);
                out.push((start, cut));
                start = cut;
            }
        }
        if is_blank(&text[start..end]) {
            if !fold_into_previous(text, &mut out, (start, end), max) {
                pending = Some((start, end));
            }
            continue;
        }
        out.push((start, end));
    }
    if let Some((blank_start, blank_end)) = pending {
        match out.pop() {
            Some((prev_start, prev_end)) => {
                let start = prev_start.min(blank_start);
                let end = blank_end.max(prev_end);
                let cut = retreat_chars(text, end, max).max(start);
                if cut > start {
                    push_folding_blank(text, &mut out, (start, cut), max);
                }
                out.push((cut, end));
            }
            None => out.push((blank_start, blank_end)),
        }
    }
    out
}

/// Extend the last span over `span` if it stays within `max`.
fn fold_into_previous(text: &str, out: &mut [Span], span: Span, max: usize) -> bool {
    let Some(prev) = out.last_mut() else { return false };
    let merged_end = span.1.max(prev.1);
    if char_len(&text[prev.0..merged_end]) > max {
        return false;
    }
    prev.1 = merged_end;
    true
}

fn push_folding_blank(text: &str, out: &mut Vec<Span>, span: Span, max: usize) {
    if !(is_blank(&text[span.0..span.1]) && fold_into_previous(text, out, span, max)) {
        out.push(span);
    }
}

/// Byte offset `n` characters after `from`.
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..].char_indices().nth(n).map_or(text.len(), |(i, _)| from + i)
}

/// Byte offset of the first of the last `n` characters before `to`.
fn retreat_chars(text: &str, to: usize, n: usize) -> usize {
    text[..to].char_indices().rev().nth(n.saturating_sub(1)).map_or(0, |(i, _)| i)
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `text[start..end]` after every occurrence of any separator.
fn split_keeping_separators(text: &str, start: usize, end: usize, separators: &[&str]) -> Vec<Span> {
    let slice = &text[start..end];
    let mut pieces = Vec::new();
    let mut piece_start = 0usize;
    let mut resume_at = 0usize;
    for (i, _) in slice.char_indices() {
        if i < resume_at { continue; }
        if let Some(sep) = separators.iter().find(|sep| slice[i..].starts_with(**sep)) {
            let cut = i + sep.len();
            pieces.push((start + piece_start, start + cut));
            piece_start = cut;
            resume_at = cut;
        }
    }
    if piece_start < slice.len() {
        pieces.push((start + piece_start, end));
    }
    pieces
}

/// Convenience wrapper: validate the sizes and chunk `document` in one call.
pub fn chunk(document: &Document, max_chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(ChunkingConfig { max_chars: max_chunk_size, overlap })?.chunk(document))
}
