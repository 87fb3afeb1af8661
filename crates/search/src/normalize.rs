/// Score spreads narrower than this are treated as flat.
pub const NORMALIZE_EPSILON: f64 = 1e-9;

/// Min-max normalize scores into [0, 1], preserving positions.
///
/// Empty input gives empty output. A flat distribution (spread below
/// [`NORMALIZE_EPSILON`], which includes a single score) maps every value
/// to 0.0 instead of dividing by ~0.
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };

    let (min, max) = values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let spread = max - min;
    if spread.is_nan() || spread < NORMALIZE_EPSILON {
        return vec![0.0; values.len()];
    }

    values
        .iter()
        .map(|&v| ((v - min) / spread).clamp(0.0, 1.0))
        .collect()
}
