//! Similarity search over stored chunks.
//!
//! Deliberately a flat scan: embed the query, dot-product against every
//! stored chunk (both sides are unit vectors, so this is cosine
//! similarity), stable-sort descending and keep the top k. Ties keep scan
//! order. Fine for a single-user corpus; an ANN index could replace the
//! scan behind the same contract if the corpus ever outgrows it.

use crate::embedding::EmbeddingClient;
use crate::error::Result;
use crate::models::{ChunkHit, SearchResult};
use crate::store::Store;

pub async fn search(
    store: &Store,
    embeddings: &EmbeddingClient,
    query: &str,
    top_k: i64,
    snippet_chars: usize,
) -> Result<Vec<SearchResult>> {
    if top_k <= 0 {
        return Ok(Vec::new());
    }
    let query_vec = embeddings.embed_one(query).await?;
    let hits = store.all_chunks_with_source().await?;
    Ok(rank(&query_vec, hits, top_k as usize, snippet_chars))
}

/// Score, order, and truncate scan results. Pure so it can be tested
/// without a store.
fn rank(
    query_vec: &[f32],
    hits: Vec<ChunkHit>,
    top_k: usize,
    snippet_chars: usize,
) -> Vec<SearchResult> {
    let mut scored: Vec<(f32, ChunkHit)> = hits
        .into_iter()
        .map(|hit| (dot(query_vec, &hit.embedding), hit))
        .collect();

    // Stable sort: equal scores keep their scan order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(score, hit)| SearchResult {
            source_id: hit.source_id,
            url: hit.url,
            title: hit.title,
            score,
            snippet: snippet(&hit.content, snippet_chars),
        })
        .collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// First `max_chars` characters of the content, with an ellipsis marker
/// when truncated.
fn snippet(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut out: String = content.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
