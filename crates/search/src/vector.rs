use anyhow::{Context, Result};
use sr_core::models::{Filters, VectorHit};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::gateway::VectorSearch;

/// Extra candidates fetched per requested hit when filters are applied
const FILTER_OVERFETCH: usize = 4;

/// What a usearch key points back to
#[derive(Debug, Clone)]
struct ChunkEntry {
    chunk_id: String,
    doc_id: String,
    metadata: HashMap<String, String>,
}

/// In-process HNSW index over chunk embeddings, backed by usearch.
///
/// Vectors are stored per chunk; hits are reported per owning document, so
/// one document can appear several times in a result list.
pub struct VectorIndex {
    index: Index,
    dimensions: usize,
    /// Forward map: chunk id → u64 key
    chunk_to_key: HashMap<String, u64>,
    /// Reverse map: u64 key → chunk entry
    entries: HashMap<u64, ChunkEntry>,
    /// Monotonically increasing key generator
    next_key: AtomicU64,
}

fn index_options(dimensions: usize) -> IndexOptions {
    IndexOptions {
        dimensions,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        connectivity: 0,     // auto
        expansion_add: 0,    // auto
        expansion_search: 0, // auto
        multi: false,
    }
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Result<Self> {
        let index = Index::new(&index_options(dimensions)).context("Failed to create usearch index")?;
        index
            .reserve(1024)
            .context("Failed to reserve usearch capacity")?;

        Ok(Self {
            index,
            dimensions,
            chunk_to_key: HashMap::new(),
            entries: HashMap::new(),
            next_key: AtomicU64::new(1),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn alloc_key(&self) -> u64 {
        self.next_key.fetch_add(1, Ordering::Relaxed)
    }

    /// Ensure the index has capacity for at least one more vector.
    fn ensure_capacity(&self) -> Result<()> {
        let current_size = self.index.size();
        let current_capacity = self.index.capacity();
        if current_size >= current_capacity {
            let new_capacity = (current_capacity * 2).max(1024);
            self.index
                .reserve(new_capacity)
                .context("Failed to grow usearch index capacity")?;
        }
        Ok(())
    }

    /// Add or replace the vector for a chunk.
    pub fn upsert(
        &mut self,
        chunk_id: &str,
        doc_id: &str,
        vector: &[f32],
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        anyhow::ensure!(
            vector.len() == self.dimensions,
            "Vector dimension mismatch: expected {}, got {}",
            self.dimensions,
            vector.len()
        );

        self.ensure_capacity()?;

        // The new vector goes in under a fresh key; the old one is only
        // dropped once the add succeeded.
        let key = self.alloc_key();
        self.index.add(key, vector).context("usearch add failed")?;

        if let Some(previous) = self.chunk_to_key.insert(chunk_id.to_string(), key) {
            self.entries.remove(&previous);
            let _ = self.index.remove(previous);
        }
        self.entries.insert(
            key,
            ChunkEntry {
                chunk_id: chunk_id.to_string(),
                doc_id: doc_id.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    /// Remove every chunk of a document. Returns the number of chunks removed.
    pub fn remove_document(&mut self, doc_id: &str) -> usize {
        let keys: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.doc_id == doc_id)
            .map(|(&key, _)| key)
            .collect();

        for key in &keys {
            if let Some(entry) = self.entries.remove(key) {
                self.chunk_to_key.remove(&entry.chunk_id);
            }
            let _ = self.index.remove(*key);
        }
        keys.len()
    }

    /// Nearest chunks for `query`, as per-document hits sorted by descending
    /// cosine similarity.
    ///
    /// usearch's Cos metric returns **distance** = 1 − cos_sim, so the
    /// similarity is `1.0 − distance`, clamped to [0, 1]. Every filter must
    /// match the chunk's metadata exactly.
    pub fn search(&self, query: &[f32], top_n: usize, filters: &Filters) -> Result<Vec<VectorHit>> {
        anyhow::ensure!(
            query.len() == self.dimensions,
            "Query dimension mismatch: expected {}, got {}",
            self.dimensions,
            query.len()
        );
        if self.entries.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let wanted = if filters.is_empty() {
            top_n
        } else {
            top_n.saturating_mul(FILTER_OVERFETCH)
        };
        let actual_limit = wanted.min(self.index.size());

        let matches = self
            .index
            .search(query, actual_limit)
            .context("usearch search failed")?;

        let mut hits: Vec<VectorHit> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(key, &distance)| {
                let entry = self.entries.get(key)?;
                let matches_filters = filters
                    .iter()
                    .all(|(k, v)| entry.metadata.get(k) == Some(v));
                matches_filters.then(|| {
                    let similarity = f64::from(1.0 - distance).clamp(0.0, 1.0);
                    VectorHit::new(entry.doc_id.clone(), similarity)
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_n);
        Ok(hits)
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`VectorIndex`] shared between request handlers, usable as a
/// [`VectorSearch`] backend.
#[derive(Clone)]
pub struct SharedVectorIndex {
    inner: Arc<RwLock<VectorIndex>>,
}

impl SharedVectorIndex {
    pub fn new(index: VectorIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    pub fn upsert(
        &self,
        chunk_id: &str,
        doc_id: &str,
        vector: &[f32],
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.inner
            .write()
            .map_err(|e| anyhow::anyhow!("vector index lock poisoned: {e}"))?
            .upsert(chunk_id, doc_id, vector, metadata)
    }

    pub fn remove_document(&self, doc_id: &str) -> Result<usize> {
        Ok(self
            .inner
            .write()
            .map_err(|e| anyhow::anyhow!("vector index lock poisoned: {e}"))?
            .remove_document(doc_id))
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|index| index.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.inner.read().map(|index| index.dimensions()).unwrap_or(0)
    }
}

impl VectorSearch for SharedVectorIndex {
    async fn search(
        &self,
        embedding: &[f32],
        top_n: usize,
        filters: &Filters,
    ) -> Result<Vec<VectorHit>> {
        let index = self
            .inner
            .read()
            .map_err(|e| anyhow::anyhow!("vector index lock poisoned: {e}"))?;
        index.search(embedding, top_n, filters)
    }
}
