use chrono::{DateTime, Utc};

/// Exponential time decay used to derive a freshness signal in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreshnessDecay {
    /// Half-life in days
    pub half_life_days: f64,
}

impl FreshnessDecay {
    pub fn new(half_life_days: f64) -> Self {
        Self { half_life_days }
    }

    /// score = exp(-λ * age_days), λ = ln(2) / half_life_days
    ///
    /// Negative ages (timestamps in the future) score 1.0. A non-positive
    /// half-life decays instantly: 1.0 at age zero, 0.0 after.
    pub fn score(&self, age_days: f64) -> f64 {
        let age_days = age_days.max(0.0);
        if self.half_life_days.is_nan() || self.half_life_days <= 0.0 {
            return if age_days == 0.0 { 1.0 } else { 0.0 };
        }
        let lambda = std::f64::consts::LN_2 / self.half_life_days;
        (-lambda * age_days).exp()
    }

    /// Freshness of something published at `published_at`, observed at `now`.
    pub fn score_at(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_days = (now - published_at).num_seconds() as f64 / 86_400.0;
        self.score(age_days)
    }
}

impl Default for FreshnessDecay {
    fn default() -> Self {
        Self {
            half_life_days: 30.0,
        }
    }
}
