use std::sync::RwLock;
use std::time::Duration;

use anyhow::Result;
use sr_core::models::{Filters, FreshnessMap, ScoredDocument, Weights};
use tokio::time::Instant;

use crate::bm25::Bm25Index;
use crate::gateway::{VectorSearch, retrieve_within};
use crate::merge::merge_and_score;

/// Per-request knobs, resolved by the caller from its configuration
#[derive(Debug, Clone, Copy)]
pub struct HybridSettings {
    pub weights: Weights,
    /// Hits requested from each retrieval source
    pub candidate_limit: usize,
    pub vector_timeout: Duration,
}

/// One hybrid query
#[derive(Debug, Clone, Copy)]
pub struct HybridQuery<'a> {
    pub text: &'a str,
    /// Precomputed query embedding; `None` skips vector retrieval
    pub embedding: Option<&'a [f32]>,
    pub filters: &'a Filters,
    pub limit: usize,
    /// The caller's own deadline, if any
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct HybridOutcome {
    /// Ranked documents, already sliced to the query limit
    pub documents: Vec<ScoredDocument>,
    /// True when vector retrieval was attempted and reported unavailable
    pub vector_fallback: bool,
}

/// Hybrid search combining BM25 keyword search + vector similarity + freshness
pub struct HybridSearch<V> {
    bm25_index: Bm25Index,
    vector: V,
    freshness: RwLock<FreshnessMap>,
}

impl<V: VectorSearch> HybridSearch<V> {
    pub fn new(bm25_index: Bm25Index, vector: V) -> Self {
        Self {
            bm25_index,
            vector,
            freshness: RwLock::new(FreshnessMap::new()),
        }
    }

    /// The vector backend (for ingestion by the owner)
    pub fn vector(&self) -> &V {
        &self.vector
    }

    /// Add a chunk's text to the BM25 index
    pub fn index_text(&self, chunk_id: &str, doc_id: &str, text: &str) -> Result<()> {
        self.bm25_index.add(chunk_id, doc_id, text)
    }

    /// Record the freshness signal for a document
    pub fn set_freshness(&self, doc_id: &str, freshness: f64) -> Result<()> {
        self.freshness
            .write()
            .map_err(|e| anyhow::anyhow!("freshness lock poisoned: {e}"))?
            .insert(doc_id.to_string(), freshness);
        Ok(())
    }

    pub fn freshness_of(&self, doc_id: &str) -> Option<f64> {
        self.freshness
            .read()
            .ok()
            .and_then(|map| map.get(doc_id).copied())
    }

    /// Forget a document's text and freshness. Vector removal is the
    /// backend owner's job since `V` is opaque here.
    pub fn remove_document(&self, doc_id: &str) -> Result<()> {
        self.bm25_index.remove_document(doc_id)?;
        self.freshness
            .write()
            .map_err(|e| anyhow::anyhow!("freshness lock poisoned: {e}"))?
            .remove(doc_id);
        Ok(())
    }

    /// Number of chunks in the BM25 index
    pub fn lexical_count(&self) -> u64 {
        self.bm25_index.len()
    }

    /// Run lexical and vector retrieval, then merge and slice.
    ///
    /// A vector failure or timeout never fails the query; it only sets
    /// `vector_fallback` and the merge proceeds on lexical + freshness.
    pub async fn search(
        &self,
        query: &HybridQuery<'_>,
        settings: &HybridSettings,
    ) -> HybridOutcome {
        // 1. BM25 keyword search
        let lexical_hits = match self.bm25_index.search(query.text, settings.candidate_limit) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "BM25 search failed");
                Vec::new()
            }
        };

        // 2. Vector search, bounded by the configured timeout
        let (vector_hits, vector_fallback) = match query.embedding {
            Some(embedding) => match retrieve_within(
                &self.vector,
                embedding,
                settings.candidate_limit,
                query.filters,
                settings.vector_timeout,
                query.deadline,
            )
            .await
            {
                Ok(hits) => (hits, false),
                Err(_) => (Vec::new(), true),
            },
            None => (Vec::new(), false),
        };

        // 3. Merge, score, rank
        let mut documents = match self.freshness.read() {
            Ok(freshness) => {
                merge_and_score(&lexical_hits, &vector_hits, &freshness, &settings.weights)
            }
            Err(e) => {
                tracing::warn!(error = %e, "freshness lock poisoned, merging without freshness");
                merge_and_score(
                    &lexical_hits,
                    &vector_hits,
                    &FreshnessMap::new(),
                    &settings.weights,
                )
            }
        };

        // 4. Top-K slice
        documents.truncate(query.limit);

        tracing::debug!(
            lexical = lexical_hits.len(),
            vector = vector_hits.len(),
            returned = documents.len(),
            vector_fallback,
            "hybrid search complete"
        );

        HybridOutcome {
            documents,
            vector_fallback,
        }
    }
}
