//! Merge-path latency measurement used by the latency harness binary.

use serde::{Deserialize, Serialize};
use sr_core::models::{FreshnessMap, LexicalHit, VectorHit, Weights};
use sr_search::merge_and_score;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BenchConfig {
    pub iterations: usize,
    /// Distinct documents the synthetic hits are drawn from
    pub documents: usize,
    /// Hits generated per source per iteration
    pub hits_per_source: usize,
    /// p95 above this fails the run
    pub p95_budget_ms: f64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            documents: 500,
            hits_per_source: 200,
            p95_budget_ms: 250.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyReport {
    pub iterations: usize,
    pub hits_per_source: usize,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
    pub p95_budget_ms: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum LatencyError {
    #[error("iterations must be greater than 0")]
    NoIterations,

    #[error("merge latency regression: p95 {p95_ms:.3}ms > budget {budget_ms:.3}ms")]
    BudgetExceeded { p95_ms: f64, budget_ms: f64 },
}

impl LatencyReport {
    pub fn check_budget(&self) -> Result<(), LatencyError> {
        if self.p95_ms > self.p95_budget_ms {
            return Err(LatencyError::BudgetExceeded {
                p95_ms: self.p95_ms,
                budget_ms: self.p95_budget_ms,
            });
        }
        Ok(())
    }
}

/// Nearest-rank percentile: the sample at index `floor((len - 1) * p)`.
///
/// `samples` must be sorted ascending; an empty slice yields 0.0.
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let idx = ((samples.len() - 1) as f64 * p.clamp(0.0, 1.0)) as usize;
    samples[idx]
}

/// Time `merge_and_score` over freshly generated hit sets.
pub fn run_merge_benchmark(config: &BenchConfig) -> Result<LatencyReport, LatencyError> {
    if config.iterations == 0 {
        return Err(LatencyError::NoIterations);
    }

    let weights = Weights::default();
    let documents = config.documents.max(1);
    let freshness: FreshnessMap = (0..documents)
        .map(|i| (doc_id(i), (i % 10) as f64 / 10.0))
        .collect();

    let mut samples = Vec::with_capacity(config.iterations);
    let mut seed = 0x5eed_u64;
    for _ in 0..config.iterations {
        let (lexical, vector) = synthetic_hits(&mut seed, documents, config.hits_per_source);

        let started = Instant::now();
        let merged = merge_and_score(&lexical, &vector, &freshness, &weights);
        samples.push(started.elapsed().as_secs_f64() * 1_000.0);

        std::hint::black_box(merged);
    }

    samples.sort_by(f64::total_cmp);
    let report = LatencyReport {
        iterations: config.iterations,
        hits_per_source: config.hits_per_source,
        p50_ms: percentile(&samples, 0.5),
        p95_ms: percentile(&samples, 0.95),
        max_ms: samples.last().copied().unwrap_or(0.0),
        p95_budget_ms: config.p95_budget_ms,
    };
    tracing::info!(p50_ms = report.p50_ms, p95_ms = report.p95_ms, "merge latency measured");
    Ok(report)
}

fn doc_id(i: usize) -> String {
    format!("doc-{i:05}")
}

/// LCG step returning a value in [0, 1)
fn next_unit(seed: &mut u64) -> f64 {
    *seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*seed >> 11) as f64 / (1u64 << 53) as f64
}

fn synthetic_hits(seed: &mut u64, documents: usize, hits: usize) -> (Vec<LexicalHit>, Vec<VectorHit>) {
    let pick = |seed: &mut u64| ((next_unit(seed) * documents as f64) as usize).min(documents - 1);
    let lexical = (0..hits)
        .map(|_| {
            let doc = pick(seed);
            LexicalHit::new(doc_id(doc), next_unit(seed) * 30.0)
        })
        .collect();
    let vector = (0..hits)
        .map(|_| {
            let doc = pick(seed);
            VectorHit::new(doc_id(doc), next_unit(seed))
        })
        .collect();
    (lexical, vector)
}
