//! Gaussian kernel density estimate for the score distribution chart

use std::f64::consts::PI;

/// Evaluation points across the curve
pub const GRID_POINTS: usize = 200;

/// Bandwidths the curve extends past the extreme samples
const CUT: f64 = 3.0;

/// Used when the samples carry no spread (one sample, or all equal)
pub const FALLBACK_BANDWIDTH: f64 = 0.5;

/// Scott's rule: sample standard deviation times `n^(-1/5)`
pub fn scott_bandwidth(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return FALLBACK_BANDWIDTH;
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return FALLBACK_BANDWIDTH;
    }
    std_dev * (n as f64).powf(-0.2)
}

/// Density curve as `(x, density)` points, empty for no samples
pub fn gaussian_kde(samples: &[f64]) -> Vec<(f64, f64)> {
    if samples.is_empty() {
        return Vec::new();
    }

    let bandwidth = scott_bandwidth(samples);
    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    let start = min - CUT * bandwidth;
    let end = max + CUT * bandwidth;
    let step = (end - start) / (GRID_POINTS - 1) as f64;

    let norm = 1.0 / (samples.len() as f64 * bandwidth * (2.0 * PI).sqrt());
    (0..GRID_POINTS)
        .map(|i| {
            let x = start + step * i as f64;
            let sum: f64 = samples
                .iter()
                .map(|s| {
                    let z = (x - s) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum();
            (x, sum * norm)
        })
        .collect()
}
