//! Indicator bank — bullish/bearish series from a price window.
//!
//! Every indicator is a pure function of the bars it is given: one output value
//! per bar, positive = bullish, negative = bearish. Positions before the lookback
//! horizon carry the neutral value `0.0` instead of NaN, so downstream stages
//! never see undefined samples.
//!
//! Indicators are independent of each other. The fusion row order is the
//! declaration order of [`IndicatorKind`], then instance index.

pub mod amplifiers;
pub mod cci;
pub mod eom;
pub mod moving_average;
pub mod oc_gradient;
pub mod rsi;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::ConfigError;

pub use amplifiers::{Volatility, Volume};
pub use cci::Cci;
pub use eom::Eom;
pub use moving_average::{
    ema_of_series, lwma_of_series, sma_of_series, LwmaDeviation, MaCrossover, MaType,
};
pub use oc_gradient::OcGradient;
pub use rsi::Rsi;

/// Broad family an indicator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorCategory {
    Momentum,
    Trend,
    Volatility,
    Volume,
    Gradient,
}

/// Tagged indicator kinds that can appear as rows of the fusion matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi,
    Sma,
    Ema,
    Lwma,
    Cci,
    Eom,
    OcGradient,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 7] = [
        IndicatorKind::Rsi,
        IndicatorKind::Sma,
        IndicatorKind::Ema,
        IndicatorKind::Lwma,
        IndicatorKind::Cci,
        IndicatorKind::Eom,
        IndicatorKind::OcGradient,
    ];

    /// Key used in persisted parameter sets (`rsi`, `oc_gradient`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            Self::Rsi => "rsi",
            Self::Sma => "sma",
            Self::Ema => "ema",
            Self::Lwma => "lwma",
            Self::Cci => "cci",
            Self::Eom => "eom",
            Self::OcGradient => "oc_gradient",
        }
    }

    pub fn category(&self) -> IndicatorCategory {
        match self {
            Self::Rsi | Self::Cci => IndicatorCategory::Momentum,
            Self::Sma | Self::Ema | Self::Lwma => IndicatorCategory::Trend,
            Self::Eom => IndicatorCategory::Volume,
            Self::OcGradient => IndicatorCategory::Gradient,
        }
    }

    /// Instance key for per-property maps: `rsi_0`, `sma_2`, ...
    pub fn instance_key(&self, index: usize) -> String {
        format!("{}_{index}", self.key())
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for IndicatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndicatorKind::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| ConfigError::UnknownIndicator(s.to_string()))
    }
}

/// Strongly-typed configuration for one indicator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorConfig {
    Rsi {
        timeframe: usize,
        upper_threshold: f64,
        lower_threshold: f64,
    },
    Sma {
        fast: usize,
        slow: usize,
    },
    Ema {
        fast: usize,
        slow: usize,
    },
    Lwma {
        timeframe: usize,
    },
    Cci {
        timeframe: usize,
    },
    Eom {
        timeframe: usize,
    },
    OcGradient,
}

impl IndicatorConfig {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            Self::Rsi { .. } => IndicatorKind::Rsi,
            Self::Sma { .. } => IndicatorKind::Sma,
            Self::Ema { .. } => IndicatorKind::Ema,
            Self::Lwma { .. } => IndicatorKind::Lwma,
            Self::Cci { .. } => IndicatorKind::Cci,
            Self::Eom { .. } => IndicatorKind::Eom,
            Self::OcGradient => IndicatorKind::OcGradient,
        }
    }

    /// Check the constraints the indicator constructors rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Rsi {
                timeframe,
                upper_threshold,
                lower_threshold,
            } => {
                check_period("rsi.timeframe", timeframe)?;
                if !(0.0 < lower_threshold
                    && lower_threshold < upper_threshold
                    && upper_threshold < 100.0)
                {
                    return Err(ConfigError::invalid(
                        "rsi thresholds",
                        format!(
                            "need 0 < lower ({lower_threshold}) < upper ({upper_threshold}) < 100"
                        ),
                    ));
                }
                Ok(())
            }
            Self::Sma { fast, slow } | Self::Ema { fast, slow } => {
                check_period("ma.fast", fast)?;
                if slow <= fast {
                    return Err(ConfigError::invalid(
                        "ma.slow",
                        format!("slow period {slow} must exceed fast period {fast}"),
                    ));
                }
                Ok(())
            }
            Self::Lwma { timeframe } => check_period("lwma.timeframe", timeframe),
            Self::Cci { timeframe } => check_period("cci.timeframe", timeframe),
            Self::Eom { timeframe } => check_period("eom.timeframe", timeframe),
            Self::OcGradient => Ok(()),
        }
    }

    /// Build the runtime indicator for this config.
    pub fn build(&self) -> Result<Box<dyn Indicator>, ConfigError> {
        self.validate()?;
        let indicator: Box<dyn Indicator> = match *self {
            Self::Rsi {
                timeframe,
                upper_threshold,
                lower_threshold,
            } => Box::new(Rsi::new(timeframe, upper_threshold, lower_threshold)),
            Self::Sma { fast, slow } => Box::new(MaCrossover::new(fast, slow, MaType::Sma)),
            Self::Ema { fast, slow } => Box::new(MaCrossover::new(fast, slow, MaType::Ema)),
            Self::Lwma { timeframe } => Box::new(LwmaDeviation::new(timeframe)),
            Self::Cci { timeframe } => Box::new(Cci::new(timeframe)),
            Self::Eom { timeframe } => Box::new(Eom::new(timeframe)),
            Self::OcGradient => Box::new(OcGradient),
        };
        Ok(indicator)
    }
}

fn check_period(key: &str, period: usize) -> Result<(), ConfigError> {
    if period == 0 {
        Err(ConfigError::invalid(key, "period must be >= 1"))
    } else {
        Ok(())
    }
}

/// Trait for bullish/bearish indicators.
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "sma_10_50").
    fn name(&self) -> &str;

    fn kind(&self) -> IndicatorKind;

    /// Number of leading bars that carry the neutral value.
    fn lookback(&self) -> usize;

    /// Compute the bullish/bearish series, one value per bar.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// One computed indicator series, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub kind: IndicatorKind,
    pub name: String,
    pub values: Vec<f64>,
}

impl IndicatorSeries {
    pub fn compute(indicator: &dyn Indicator, bars: &[Bar]) -> Self {
        Self {
            kind: indicator.kind(),
            name: indicator.name().to_string(),
            values: indicator.compute(bars),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Replace undefined samples with the neutral value.
pub(crate) fn neutral_fill(values: &mut [f64]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open,close) + 1.0,
/// low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
