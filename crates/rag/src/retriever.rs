//! The retriever (C3): ties the embedding chain and the collection store
//! together with query understanding and metadata re-ranking. Never
//! propagates a failure to its caller — every fault downgrades to an empty
//! context.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use assistant_config::constants::rag::{
    ADAPTIVE_DISTANCE_MEAN_THRESHOLD, ADAPTIVE_DISTANCE_MIN_POOL, ADAPTIVE_DISTANCE_MULTIPLIER,
    KEYWORD_SCAN_MIN_TOKEN_LEN, MAX_TOP_K, SECTION_FILTER_MIN_POOL, TOP_K_MULTIPLIER,
};
use assistant_core::document::{Candidate, Document, Source};
use assistant_core::retrieval::Query;

use crate::embeddings::EmbeddingProviderChain;
use crate::intent::expand_query;
use crate::reranker::{render_candidate, score_candidates};
use crate::vector_store::CollectionStore;

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub website_collection: String,
    pub ista_collection: String,
    /// Number of renderings concatenated into the returned context. The
    /// default favors a single terse passage; callers that want a fuller
    /// context can widen it.
    pub passages_per_response: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self { website_collection: "website_content".to_string(), ista_collection: "ista_documents".to_string(), passages_per_response: 1 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    pub context: String,
    pub sources: Vec<Source>,
    pub rag_used: bool,
}

/// Capability interface for "give me context for this query". Lets callers
/// outside this crate depend on retrieval without pulling in a live
/// `CollectionStore`, the same way the core traits decouple the engine from
/// concrete LLM and storage backends.
#[async_trait]
pub trait RetrievalPort: Send + Sync {
    async fn retrieve(&self, query: Query) -> RetrievalOutcome;
}

pub struct Retriever {
    embeddings: Arc<EmbeddingProviderChain>,
    store: CollectionStore,
    config: RetrieverConfig,
}

impl Retriever {
    /// Opens both collections against the active embedding chain's
    /// dimension and returns a ready-to-query retriever.
    pub async fn new(
        embeddings: Arc<EmbeddingProviderChain>,
        mut store: CollectionStore,
        config: RetrieverConfig,
    ) -> Result<Self, crate::RagError> {
        use assistant_core::document::CollectionOrigin;

        let dim = embeddings.dim();
        store.open_or_create(&config.website_collection, CollectionOrigin::WebsiteContent, dim).await?;
        store.open_or_create(&config.ista_collection, CollectionOrigin::IstaDocuments, dim).await?;
        Ok(Self { embeddings, store, config })
    }

    pub async fn retrieve(&self, query: Query) -> RetrievalOutcome {
        let expanded = expand_query(&query);
        let top_k = (TOP_K_MULTIPLIER * query.n_results.max(1)).min(MAX_TOP_K);

        let embedding = match self.embeddings.embed(&[expanded.expanded_text.clone()]).await {
            Ok(mut v) if !v.is_empty() => v.remove(0),
            _ => {
                tracing::warn!("embedding failed during retrieval, returning empty context");
                return RetrievalOutcome::default();
            }
        };

        let mut candidates = self.dense_search(&embedding, top_k).await;

        if candidates.is_empty() {
            candidates = self.keyword_scan_fallback(&expanded.keyword_set).await;
        }

        if candidates.is_empty() {
            return RetrievalOutcome::default();
        }

        candidates = adaptive_distance_filter(candidates);
        let filtered = section_filter(candidates.clone(), query.section_hint.as_deref());
        let candidates = if filtered.is_empty() { candidates } else { filtered };

        let ranked = score_candidates(candidates, &expanded);
        let n = self.config.passages_per_response.max(1).min(ranked.len());

        let mut seen_sources = HashSet::new();
        let mut renderings = Vec::with_capacity(n);
        let mut sources = Vec::new();
        for candidate in ranked.iter().take(n) {
            let (rendering, source) = render_candidate(candidate);
            renderings.push(rendering);
            if let Some(source) = source {
                if let Some(key) = source.dedup_key() {
                    if seen_sources.insert(key) {
                        sources.push(source);
                    }
                }
            }
        }

        let context = renderings.join("\n\n---\n\n");
        let rag_used = !context.is_empty();
        RetrievalOutcome { context, sources, rag_used }
    }

    async fn dense_search(&self, embedding: &[f32], top_k: usize) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for collection in [&self.config.website_collection, &self.config.ista_collection] {
            match self.store.query(collection, embedding, top_k, None).await {
                Ok(hits) => candidates.extend(hits.into_iter().map(hit_to_candidate)),
                Err(e) => tracing::warn!(collection, error = %e, "collection query failed, skipping"),
            }
        }
        candidates
    }

    async fn keyword_scan_fallback(&self, keyword_set: &HashSet<String>) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for collection in [&self.config.website_collection, &self.config.ista_collection] {
            match self.store.get_all(collection).await {
                Ok(hits) => {
                    for hit in hits {
                        let haystack = hit.content.to_lowercase();
                        let hit_count = keyword_set
                            .iter()
                            .filter(|t| t.chars().count() > KEYWORD_SCAN_MIN_TOKEN_LEN && haystack.contains(t.as_str()))
                            .count();
                        if hit_count >= 1 {
                            let mut candidate = hit_to_candidate(hit);
                            candidate.keyword_hits = hit_count;
                            candidates.push(candidate);
                        }
                    }
                }
                Err(e) => tracing::warn!(collection, error = %e, "keyword scan failed, skipping"),
            }
        }
        candidates
    }
}

#[async_trait]
impl RetrievalPort for Retriever {
    async fn retrieve(&self, query: Query) -> RetrievalOutcome {
        Retriever::retrieve(self, query).await
    }
}

fn hit_to_candidate(hit: assistant_core::document::VectorHit) -> Candidate {
    Candidate {
        document: Document { id: hit.id, content: hit.content, metadata: hit.metadata },
        raw_distance: hit.distance,
        keyword_hits: 0,
        metadata_boost: 0.0,
        final_score: 0.0,
        collection_origin: hit.origin,
    }
}

fn adaptive_distance_filter(candidates: Vec<Candidate>) -> Vec<Candidate> {
    if candidates.len() <= ADAPTIVE_DISTANCE_MIN_POOL {
        return candidates;
    }
    let mean: f32 = candidates.iter().map(|c| c.raw_distance).sum::<f32>() / candidates.len() as f32;
    if mean <= ADAPTIVE_DISTANCE_MEAN_THRESHOLD {
        return candidates;
    }
    let threshold = mean * ADAPTIVE_DISTANCE_MULTIPLIER;
    candidates.into_iter().filter(|c| c.raw_distance <= threshold).collect()
}

fn section_filter(candidates: Vec<Candidate>, section_hint: Option<&str>) -> Vec<Candidate> {
    let Some(hint) = section_hint else { return candidates };
    if candidates.len() <= SECTION_FILTER_MIN_POOL {
        return candidates;
    }
    let hint = hint.to_lowercase();
    candidates
        .into_iter()
        .filter(|c| c.document.meta("section").map(|s| s.to_lowercase().contains(&hint)).unwrap_or(true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::document::CollectionOrigin;

    fn candidate(distance: f32) -> Candidate {
        Candidate {
            document: Document::new("id", "contenu"),
            raw_distance: distance,
            keyword_hits: 0,
            metadata_boost: 0.0,
            final_score: 0.0,
            collection_origin: CollectionOrigin::WebsiteContent,
        }
    }

    #[test]
    fn adaptive_filter_leaves_small_pools_untouched() {
        let pool: Vec<Candidate> = (0..5).map(|_| candidate(2000.0)).collect();
        assert_eq!(adaptive_distance_filter(pool.clone()).len(), pool.len());
    }

    #[test]
    fn adaptive_filter_drops_outliers_in_large_high_distance_pools() {
        let mut pool: Vec<Candidate> = (0..11).map(|_| candidate(1000.0)).collect();
        pool.push(candidate(100_000.0));
        let filtered = adaptive_distance_filter(pool);
        assert!(filtered.iter().all(|c| c.raw_distance < 100_000.0));
    }

    #[test]
    fn section_filter_is_noop_under_threshold() {
        let pool: Vec<Candidate> = (0..3).map(|_| candidate(1.0)).collect();
        assert_eq!(section_filter(pool.clone(), Some("rentree")).len(), pool.len());
    }
}
