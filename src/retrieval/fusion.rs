//! Weighted score fusion across branches
//!
//! Branch scores live on different scales: keyword backends hand back
//! BM25-ish scores around 0-100, vector backends hand back distances.
//! Both are squashed into [0, 1] and combined per chunk under the routing
//! weights. A chunk found by several branches accumulates every
//! contribution, which is what pushes corroborated chunks up the ranking.

use crate::retrieval::analyzer::QueryWeights;
use crate::retrieval::fanout::BranchHits;
use crate::retrieval::RetrievalCandidate;
use ahash::AHashMap;

/// Squash a keyword score into [0, 1], saturating at 100
pub fn normalize_keyword_score(score: f32) -> f32 {
    (score / 100.0).min(1.0)
}

/// Turn a raw distance into a similarity in (0, 1]; zero distance is 1
pub fn vector_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Fuse all branch hits into one candidate list, sorted by combined score
/// descending with chunk id as the tie-break.
pub fn fuse(hits: &BranchHits, weights: &QueryWeights) -> Vec<RetrievalCandidate> {
    let mut by_chunk: AHashMap<String, RetrievalCandidate> = AHashMap::new();

    for hit in &hits.keyword_hits {
        let candidate = by_chunk
            .entry(hit.chunk_id.clone())
            .or_insert_with(|| RetrievalCandidate::new(hit.document_id, &hit.chunk_id, &hit.content));
        candidate.combined_score += normalize_keyword_score(hit.score) * weights.keyword;
    }

    for hit in &hits.vector_hits {
        let candidate = by_chunk
            .entry(hit.chunk_id.clone())
            .or_insert_with(|| RetrievalCandidate::new(hit.document_id, &hit.chunk_id, &hit.content));
        candidate.combined_score += vector_similarity(hit.distance) * weights.vector;
        candidate.vector_distance = Some(match candidate.vector_distance {
            Some(seen) => seen.min(hit.distance),
            None => hit.distance,
        });
    }

    let mut candidates: Vec<RetrievalCandidate> = by_chunk
        .into_iter()
        .map(|(_, candidate)| candidate)
        .collect();
    candidates.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    candidates
}
