//! Spline normalizer — smooth, optionally flip, and rescale a series onto [-1,1].
//!
//! A "spline" here is a smoothed, normalized resampling of a raw indicator
//! series. The steps, in order:
//!
//! 1. linear upsampling by the model's interpolation factor,
//! 2. causal exponential smoothing, `alpha = 1/(1 + smoothing_factor)`,
//! 3. min/max normalization onto [-1,1],
//! 4. sign flip when requested.
//!
//! No samples are dropped: an input of `n` samples upsampled by `k` always
//! yields `(n - 1) * k + 1` samples, and price step `t` sits at index `t * k`.

/// Linear interpolation between consecutive samples.
pub fn upsample(values: &[f64], factor: usize) -> Vec<f64> {
    if factor <= 1 || values.len() < 2 {
        return values.to_vec();
    }
    let mut out = Vec::with_capacity((values.len() - 1) * factor + 1);
    for pair in values.windows(2) {
        for j in 0..factor {
            let frac = j as f64 / factor as f64;
            out.push(pair[0] + (pair[1] - pair[0]) * frac);
        }
    }
    if let Some(&last) = values.last() {
        out.push(last);
    }
    out
}

/// Pick the samples aligned with price steps out of an upsampled series.
pub fn align_to_steps(values: &[f64], factor: usize) -> Vec<f64> {
    if factor <= 1 {
        return values.to_vec();
    }
    values.iter().step_by(factor).copied().collect()
}

/// Causal exponential smoother. A smoothing factor of 0 (or less) is the identity.
pub fn smooth(values: &[f64], smoothing_factor: f64) -> Vec<f64> {
    let s = if smoothing_factor.is_finite() {
        smoothing_factor.max(0.0)
    } else {
        0.0
    };
    let alpha = 1.0 / (1.0 + s);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// Rescale onto [-1,1] by the series' own min and max.
///
/// A flat (or empty) series has no range to rescale and comes back as zeros.
pub fn normalize_minus_one_one(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values
        .iter()
        .map(|&v| (2.0 * (v - min) / range - 1.0).clamp(-1.0, 1.0))
        .collect()
}

pub fn flip(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| -v).collect()
}

/// Per-series spline settings carried by every indicator instance.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplineProperties {
    pub smoothing_factor: f64,
    pub weight: f64,
    pub flip: bool,
}

/// Turn one raw series into its normalized spline.
pub fn build_spline(
    values: &[f64],
    smoothing_factor: f64,
    flipped: bool,
    interpolation_factor: usize,
) -> Vec<f64> {
    let upsampled = upsample(values, interpolation_factor);
    let normalized = normalize_minus_one_one(&smooth(&upsampled, smoothing_factor));
    if flipped {
        flip(&normalized)
    } else {
        normalized
    }
}
