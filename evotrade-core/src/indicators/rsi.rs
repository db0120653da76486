//! Relative Strength Index mapped to a bullish/bearish value.
//!
//! Raw RSI uses Wilder smoothing of average gains and losses, bounded to [0,100].
//! The mapped value is positive when RSI sits below the lower threshold
//! (oversold), negative above the upper threshold (overbought), 0 between.
//! Lookback: timeframe.

use super::{Indicator, IndicatorKind};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    timeframe: usize,
    upper: f64,
    lower: f64,
    name: String,
}

impl Rsi {
    /// Callers validate through `IndicatorConfig`; a zero timeframe is treated as 1.
    pub fn new(timeframe: usize, upper: f64, lower: f64) -> Self {
        let timeframe = timeframe.max(1);
        Self {
            timeframe,
            upper,
            lower,
            name: format!("rsi_{timeframe}"),
        }
    }

    /// Raw Wilder RSI in [0,100]; NaN before the lookback.
    pub fn raw(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let period = self.timeframe;
        let mut result = vec![f64::NAN; n];
        if n < period + 1 {
            return result;
        }

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=period {
            let ch = bars[i].close - bars[i - 1].close;
            if ch > 0.0 {
                avg_gain += ch;
            } else {
                avg_loss -= ch;
            }
        }
        avg_gain /= period as f64;
        avg_loss /= period as f64;
        result[period] = wilder_rsi(avg_gain, avg_loss);

        let alpha = 1.0 / period as f64;
        for i in (period + 1)..n {
            let ch = bars[i].close - bars[i - 1].close;
            let gain = ch.max(0.0);
            let loss = (-ch).max(0.0);
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
            result[i] = wilder_rsi(avg_gain, avg_loss);
        }
        result
    }

    /// Map one RSI reading onto [-1,1].
    pub fn map(&self, rsi: f64) -> f64 {
        if rsi < self.lower {
            (self.lower - rsi) / self.lower
        } else if rsi > self.upper {
            -(rsi - self.upper) / (100.0 - self.upper)
        } else {
            0.0
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Rsi
    }

    fn lookback(&self) -> usize {
        self.timeframe
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .raw(bars)
            .into_iter()
            .map(|rsi| if rsi.is_nan() { 0.0 } else { self.map(rsi) })
            .collect();
        super::neutral_fill(&mut values);
        values
    }
}

fn wilder_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn raw_all_gains_is_100() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let rsi = Rsi::new(3, 70.0, 30.0);
        assert_approx(rsi.raw(&bars)[3], 100.0, 1e-6);
    }

    #[test]
    fn raw_all_losses_is_0() {
        let bars = make_bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let rsi = Rsi::new(3, 70.0, 30.0);
        assert_approx(rsi.raw(&bars)[3], 0.0, 1e-6);
    }

    #[test]
    fn raw_mixed_seed() {
        // changes +0.34, -0.25, -0.48 → RSI = 100 - 100/(1 + 0.34/0.73)
        let bars = make_bars(&[44.0, 44.34, 44.09, 43.61, 44.33]);
        let rsi = Rsi::new(3, 70.0, 30.0);
        let raw = rsi.raw(&bars);
        assert!(raw[2].is_nan());
        assert_approx(raw[3], 100.0 - 100.0 / (1.0 + 0.34 / 0.73), 1e-9);
    }

    #[test]
    fn mapping_sign_convention() {
        let rsi = Rsi::new(14, 70.0, 30.0);
        // Oversold is bullish
        assert_approx(rsi.map(15.0), 0.5, DEFAULT_EPSILON);
        assert_approx(rsi.map(0.0), 1.0, DEFAULT_EPSILON);
        // Overbought is bearish
        assert_approx(rsi.map(85.0), -0.5, DEFAULT_EPSILON);
        assert_approx(rsi.map(100.0), -1.0, DEFAULT_EPSILON);
        assert_eq!(rsi.map(50.0), 0.0);
    }

    #[test]
    fn rising_prices_read_bearish() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let values = Rsi::new(3, 70.0, 30.0).compute(&bars);
        assert_eq!(&values[..3], &[0.0, 0.0, 0.0]);
        assert_approx(values[3], -1.0, 1e-6);
    }

    #[test]
    fn output_bounded() {
        let bars = make_bars(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let values = Rsi::new(3, 70.0, 30.0).compute(&bars);
        for (i, &v) in values.iter().enumerate() {
            assert!((-1.0..=1.0).contains(&v), "out of bounds at bar {i}: {v}");
        }
    }

    #[test]
    fn too_few_bars_all_neutral() {
        let bars = make_bars(&[100.0, 101.0]);
        let values = Rsi::new(14, 70.0, 30.0).compute(&bars);
        assert!(values.iter().all(|&v| v == 0.0));
    }
}
