//! Commodity Channel Index, scaled to [-1,1].
//!
//! CCI = (tp - sma(tp)) / (0.015 * mean_deviation(tp)), tp = typical price.
//! The bullish/bearish value is CCI/100 clamped to [-1,1]; a flat window
//! (zero mean deviation) reads neutral.
//! Lookback: timeframe - 1.

use super::{neutral_fill, sma_of_series, Indicator, IndicatorKind};
use crate::domain::Bar;

const LAMBERT_CONSTANT: f64 = 0.015;

#[derive(Debug, Clone)]
pub struct Cci {
    timeframe: usize,
    name: String,
}

impl Cci {
    pub fn new(timeframe: usize) -> Self {
        Self {
            timeframe,
            name: format!("cci_{timeframe}"),
        }
    }

    /// Unscaled CCI; NaN before the lookback.
    pub fn raw(&self, bars: &[Bar]) -> Vec<f64> {
        let tp: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
        let mean = sma_of_series(&tp, self.timeframe);
        let mut result = vec![f64::NAN; tp.len()];
        for i in 0..tp.len() {
            if mean[i].is_nan() {
                continue;
            }
            let window = &tp[(i + 1 - self.timeframe)..=i];
            let mean_dev =
                window.iter().map(|v| (v - mean[i]).abs()).sum::<f64>() / self.timeframe as f64;
            result[i] = if mean_dev == 0.0 {
                0.0
            } else {
                (tp[i] - mean[i]) / (LAMBERT_CONSTANT * mean_dev)
            };
        }
        result
    }
}

impl Indicator for Cci {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Cci
    }

    fn lookback(&self) -> usize {
        self.timeframe.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .raw(bars)
            .into_iter()
            .map(|cci| (cci / 100.0).clamp(-1.0, 1.0))
            .collect();
        neutral_fill(&mut values);
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn flat_series_is_neutral() {
        let bars = make_bars(&[50.0; 10]);
        let values = Cci::new(5).compute(&bars);
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn raw_matches_hand_computation() {
        // Symmetric high/low around the close makes tp == close.
        let mut bars = make_bars(&[1.0, 2.0, 3.0]);
        for b in &mut bars {
            b.high = b.close + 1.0;
            b.low = b.close - 1.0;
        }
        // tp = [1,2,3], mean = 2, mean_dev = 2/3, cci = 1 / (0.015 * 2/3) = 100
        let raw = Cci::new(3).raw(&bars);
        assert_approx(raw[2], 100.0, 1e-9);
        assert_approx(Cci::new(3).compute(&bars)[2], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn output_clamped() {
        let closes = [10.0, 10.0, 10.0, 10.0, 30.0, 5.0, 40.0];
        let values = Cci::new(4).compute(&make_bars(&closes));
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!(values[4] > 0.0);
    }
}
