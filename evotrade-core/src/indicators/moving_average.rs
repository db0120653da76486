//! Moving averages and the trend indicators built on them.
//!
//! - `sma_of_series`: rolling mean, first value at index period-1.
//! - `ema_of_series`: alpha = 2/(period+1), seeded with the SMA of the first `period` values.
//! - `lwma_of_series`: linearly weighted, most recent sample weighs `period`.
//!
//! All three return NaN before the lookback; the indicators below turn that
//! into the neutral value.

use serde::{Deserialize, Serialize};

use super::{neutral_fill, Indicator, IndicatorKind};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaType {
    Sma,
    Ema,
}

pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    let mut sum: f64 = values[..period].iter().sum();
    result[period - 1] = sum / period as f64;
    for i in period..n {
        sum += values[i] - values[i - period];
        result[i] = sum / period as f64;
    }
    result
}

pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = prev;
    for i in period..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

pub fn lwma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }
    let denom = (period * (period + 1)) as f64 / 2.0;
    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| (j + 1) as f64 * v)
            .sum();
        result[i] = weighted / denom;
    }
    result
}

fn average(values: &[f64], period: usize, ma_type: MaType) -> Vec<f64> {
    match ma_type {
        MaType::Sma => sma_of_series(values, period),
        MaType::Ema => ema_of_series(values, period),
    }
}

/// Relative spread of a fast over a slow moving average of closes.
///
/// `(fast - slow) / slow`, so the sign is sign(fast − slow).
#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast: usize,
    slow: usize,
    ma_type: MaType,
    name: String,
}

impl MaCrossover {
    pub fn new(fast: usize, slow: usize, ma_type: MaType) -> Self {
        let prefix = match ma_type {
            MaType::Sma => "sma",
            MaType::Ema => "ema",
        };
        Self {
            fast,
            slow,
            ma_type,
            name: format!("{prefix}_{fast}_{slow}"),
        }
    }
}

impl Indicator for MaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        match self.ma_type {
            MaType::Sma => IndicatorKind::Sma,
            MaType::Ema => IndicatorKind::Ema,
        }
    }

    fn lookback(&self) -> usize {
        self.slow.max(self.fast).saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = average(&closes, self.fast, self.ma_type);
        let slow = average(&closes, self.slow, self.ma_type);
        let mut values: Vec<f64> = fast
            .iter()
            .zip(&slow)
            .map(|(&f, &s)| if s == 0.0 { 0.0 } else { (f - s) / s })
            .collect();
        neutral_fill(&mut values);
        values
    }
}

/// Relative deviation of the close from its linearly weighted average.
#[derive(Debug, Clone)]
pub struct LwmaDeviation {
    timeframe: usize,
    name: String,
}

impl LwmaDeviation {
    pub fn new(timeframe: usize) -> Self {
        Self {
            timeframe,
            name: format!("lwma_{timeframe}"),
        }
    }
}

impl Indicator for LwmaDeviation {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Lwma
    }

    fn lookback(&self) -> usize {
        self.timeframe.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let lwma = lwma_of_series(&closes, self.timeframe);
        let mut values: Vec<f64> = closes
            .iter()
            .zip(&lwma)
            .map(|(&c, &l)| if l == 0.0 { 0.0 } else { (c - l) / l })
            .collect();
        neutral_fill(&mut values);
        values
    }
}
