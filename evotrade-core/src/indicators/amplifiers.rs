//! Volume and volatility amplifier series.
//!
//! Amplifiers are not fusion rows. They feed the optional amplitude modulation
//! of the fused signal. Both rescale onto [-1,1] with `2*(x-min)/(max-min)-1`
//! over the window; a flat window reads 0 everywhere.

use crate::domain::Bar;

/// Rescale `values` onto [-1,1] over its own range.
///
/// NaN entries are ignored for the range and come back as 0.
pub fn rescale_to_unit_band(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    if !range.is_finite() || range == 0.0 {
        return vec![0.0; values.len()];
    }
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                2.0 * (v - min) / range - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Volume;

impl Volume {
    pub fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        rescale_to_unit_band(&volumes)
    }
}

/// Rolling population standard deviation of close-to-close returns.
#[derive(Debug, Clone, Copy)]
pub struct Volatility {
    timeframe: usize,
}

impl Volatility {
    pub fn new(timeframe: usize) -> Self {
        Self {
            timeframe: timeframe.max(1),
        }
    }

    pub fn lookback(&self) -> usize {
        self.timeframe
    }

    /// Unscaled rolling volatility; NaN before the lookback.
    pub fn raw(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        let returns: Vec<f64> = bars
            .windows(2)
            .map(|w| {
                if w[0].close == 0.0 {
                    0.0
                } else {
                    (w[1].close - w[0].close) / w[0].close
                }
            })
            .collect();
        let period = self.timeframe;
        for i in period..n {
            // returns[j] is the return into bar j + 1
            let window = &returns[(i - period)..i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let var = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / period as f64;
            result[i] = var.sqrt();
        }
        result
    }

    pub fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rescale_to_unit_band(&self.raw(bars))
    }
}
