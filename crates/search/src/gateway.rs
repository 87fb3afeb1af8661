//! Deadline-bound access to a pluggable vector-search backend.
//!
//! Any provider failure and any timeout collapse into [`VectorUnavailable`],
//! so callers only ever decide between "have hits" and "fall back to
//! lexical-only". The cause is logged here and nowhere else.
//!
//! Cancellation is structural: the provider's future is owned by the gateway
//! future, so dropping the caller's future (or hitting either deadline) drops
//! the in-flight provider call. Nothing is spawned and nothing outlives the
//! call.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sr_core::models::{Filters, VectorHit};
use tokio::time::Instant;

/// The only error the gateway reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("vector unavailable")]
pub struct VectorUnavailable;

/// A vector-similarity backend: local index, remote service or test double.
pub trait VectorSearch: Send + Sync {
    /// Return up to `top_n` hits for `embedding`, restricted by `filters`.
    fn search(
        &self,
        embedding: &[f32],
        top_n: usize,
        filters: &Filters,
    ) -> impl Future<Output = anyhow::Result<Vec<VectorHit>>> + Send;
}

impl<T: VectorSearch> VectorSearch for Arc<T> {
    fn search(
        &self,
        embedding: &[f32],
        top_n: usize,
        filters: &Filters,
    ) -> impl Future<Output = anyhow::Result<Vec<VectorHit>>> + Send {
        (**self).search(embedding, top_n, filters)
    }
}

/// Single attempt against `provider`, abandoned after `timeout`.
pub async fn retrieve_with_deadline<V: VectorSearch>(
    provider: &V,
    embedding: &[f32],
    top_n: usize,
    filters: &Filters,
    timeout: Duration,
) -> Result<Vec<VectorHit>, VectorUnavailable> {
    retrieve_within(provider, embedding, top_n, filters, timeout, None).await
}

/// Like [`retrieve_with_deadline`], but never runs past `outer_deadline`
/// (the caller's own request deadline) even if `timeout` is longer.
pub async fn retrieve_within<V: VectorSearch>(
    provider: &V,
    embedding: &[f32],
    top_n: usize,
    filters: &Filters,
    timeout: Duration,
    outer_deadline: Option<Instant>,
) -> Result<Vec<VectorHit>, VectorUnavailable> {
    let started = Instant::now();
    let deadline = effective_deadline(started, timeout, outer_deadline);

    match tokio::time::timeout_at(deadline, provider.search(embedding, top_n, filters)).await {
        Ok(Ok(hits)) => {
            tracing::debug!(
                hits = hits.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "vector search ok"
            );
            Ok(hits)
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "vector search failed, falling back to lexical");
            Err(VectorUnavailable)
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "vector search timed out, falling back to lexical"
            );
            Err(VectorUnavailable)
        }
    }
}

/// Roughly 30 years; stands in for "no timeout" when `now + timeout` overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn effective_deadline(now: Instant, timeout: Duration, outer: Option<Instant>) -> Instant {
    let own = now
        .checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE);
    match outer {
        Some(outer) => own.min(outer),
        None => own,
    }
}
