//! Paragraph-level semantic relevance filter.
//!
//! Each hit's text is split into paragraphs, the question and every
//! paragraph are embedded in one batch, and only paragraphs whose cosine
//! similarity to the question reaches the threshold are kept. The filter
//! never turns a non-empty result set into an empty one: if nothing passes,
//! the input comes back unchanged.

use ankigen_core::{Embedder, EmbeddingError, SearchResult};
use tracing::{debug, info};

/// Paragraphs shorter than this are treated as noise (nav links, captions).
pub const MIN_PARAGRAPH_CHARS: usize = 50;

/// Split on blank lines, trim, and drop short paragraphs.
///
/// If nothing survives but the text is not blank, the whole trimmed text is
/// returned as a single paragraph.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| p.chars().count() >= MIN_PARAGRAPH_CHARS)
        .map(String::from)
        .collect();

    let trimmed = text.trim();
    if paragraphs.is_empty() && !trimmed.is_empty() {
        return vec![trimmed.to_string()];
    }
    paragraphs
}

/// Cosine similarity of two vectors, accumulated in f64.
///
/// Returns 0.0 when either vector has zero magnitude, or when the lengths
/// differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Keep only the paragraphs of `results` relevant to `question`.
///
/// Errors from the embedder (including a batch of the wrong length) are
/// returned to the caller, who decides whether to fall back to the
/// unfiltered results.
pub async fn filter(
    embedder: &dyn Embedder,
    question: &str,
    results: &[SearchResult],
    threshold: f32,
) -> Result<Vec<SearchResult>, EmbeddingError> {
    if results.is_empty() {
        return Ok(Vec::new());
    }

    let per_result: Vec<Vec<String>> = results.iter().map(|r| split_paragraphs(&r.text)).collect();
    let total: usize = per_result.iter().map(Vec::len).sum();
    if total == 0 {
        debug!("No paragraphs to filter");
        return Ok(results.to_vec());
    }

    let mut batch = Vec::with_capacity(total + 1);
    batch.push(question.to_string());
    batch.extend(per_result.iter().flatten().cloned());

    let embeddings = embedder.embed(&batch).await?;
    if embeddings.len() != batch.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: batch.len(),
            actual: embeddings.len(),
        });
    }

    let anchor = &embeddings[0];
    let mut scores = embeddings[1..].iter().map(|e| cosine_similarity(anchor, e));

    let mut focused = Vec::new();
    for (result, paragraphs) in results.iter().zip(&per_result) {
        let kept: Vec<&str> = paragraphs
            .iter()
            .filter(|_| scores.next().is_some_and(|s| s >= threshold))
            .map(String::as_str)
            .collect();

        debug!(
            kept = kept.len(),
            total = paragraphs.len(),
            title = %result.title,
            "Filtered result"
        );

        if !kept.is_empty() {
            focused.push(SearchResult {
                text: kept.join("\n\n"),
                ..result.clone()
            });
        }
    }

    info!(kept = focused.len(), total = results.len(), threshold, "Semantic filter done");

    if focused.is_empty() {
        info!("No results above threshold, keeping all");
        return Ok(results.to_vec());
    }
    Ok(focused)
}
