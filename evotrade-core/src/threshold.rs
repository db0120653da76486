//! Dynamic threshold engine — upper/lower bounds and per-step decisions.
//!
//! Decisions follow a reversal convention on the fused signal:
//! - `Buy` when the signal crosses down through the lower bound:
//!   `signal[t] <= lower[t] && signal[t-1] > lower[t-1]`
//! - `Sell` when it crosses up through the upper bound:
//!   `signal[t] >= upper[t] && signal[t-1] < upper[t-1]`
//! - `Hold` otherwise. Step 0 has no predecessor and is always `Hold`.

use serde::{Deserialize, Serialize};

use crate::domain::{DecisionStream, TradeDecision};
use crate::error::ConfigError;

/// Decision emitted when a step satisfies both crossing rules at once.
pub const CROSSING_TIE_DECISION: TradeDecision = TradeDecision::Sell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    #[default]
    Standard,
    RollingBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub mode: ThresholdMode,
    pub standard_upper: f64,
    pub standard_lower: f64,
    pub buffer: f64,
    pub band_width: f64,
    pub timeframe: usize,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Standard,
            standard_upper: 0.5,
            standard_lower: -0.5,
            buffer: 0.0,
            band_width: 1.0,
            timeframe: 20,
        }
    }
}

impl ThresholdParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.standard_lower < self.standard_upper) {
            return Err(ConfigError::invalid(
                "major_spline_standard_thresholds",
                format!(
                    "lower ({}) must be below upper ({})",
                    self.standard_lower, self.standard_upper
                ),
            ));
        }
        if !self.buffer.is_finite() || !self.band_width.is_finite() || self.band_width < 0.0 {
            return Err(ConfigError::invalid(
                "general_settings",
                "buffer and band_width must be finite, band_width >= 0",
            ));
        }
        Ok(())
    }
}

/// Upper and lower threshold series, one value per signal sample.
pub fn compute_thresholds(signal: &[f64], params: &ThresholdParams) -> (Vec<f64>, Vec<f64>) {
    let std_upper = params.standard_upper + params.buffer;
    let std_lower = params.standard_lower - params.buffer;
    let n = signal.len();
    match params.mode {
        ThresholdMode::Standard => (vec![std_upper; n], vec![std_lower; n]),
        ThresholdMode::RollingBand => {
            let period = params.timeframe.max(1);
            let mut upper = vec![std_upper; n];
            let mut lower = vec![std_lower; n];
            for t in (period - 1)..n {
                let window = &signal[(t + 1 - period)..=t];
                let mean = window.iter().sum::<f64>() / period as f64;
                let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
                let half_band = params.band_width * var.sqrt();
                upper[t] = mean + half_band + params.buffer;
                lower[t] = mean - half_band - params.buffer;
            }
            (upper, lower)
        }
    }
}

/// Per-step decisions from a signal and its thresholds.
pub fn decide(signal: &[f64], upper: &[f64], lower: &[f64]) -> DecisionStream {
    let n = signal.len().min(upper.len()).min(lower.len());
    let mut decisions = Vec::with_capacity(n);
    for t in 0..n {
        if t == 0 {
            decisions.push(TradeDecision::Hold);
            continue;
        }
        let buy = signal[t] <= lower[t] && signal[t - 1] > lower[t - 1];
        let sell = signal[t] >= upper[t] && signal[t - 1] < upper[t - 1];
        let decision = match (buy, sell) {
            (true, true) => CROSSING_TIE_DECISION,
            (true, false) => TradeDecision::Buy,
            (false, true) => TradeDecision::Sell,
            (false, false) => TradeDecision::Hold,
        };
        decisions.push(decision);
    }
    DecisionStream::from_decisions(decisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard(upper: f64, lower: f64) -> ThresholdParams {
        ThresholdParams {
            standard_upper: upper,
            standard_lower: lower,
            ..ThresholdParams::default()
        }
    }

    #[test]
    fn buffer_widens_standard_band() {
        let params = ThresholdParams {
            buffer: 0.1,
            ..standard(0.5, -0.5)
        };
        let (upper, lower) = compute_thresholds(&[0.0; 3], &params);
        assert!(upper.iter().all(|u| (u - 0.6).abs() < 1e-12));
        assert!(lower.iter().all(|l| (l + 0.6).abs() < 1e-12));
    }

    #[test]
    fn crossing_below_lower_is_buy() {
        let signal = [0.0, -0.4, -0.6, -0.7];
        let (upper, lower) = compute_thresholds(&signal, &standard(0.5, -0.5));
        let stream = decide(&signal, &upper, &lower);
        assert_eq!(stream.decisions[2], TradeDecision::Buy);
        // staying below is not a new crossing
        assert_eq!(stream.decisions[3], TradeDecision::Hold);
        assert_eq!(stream.buy_steps, vec![2]);
    }

    #[test]
    fn crossing_above_upper_is_sell() {
        let signal = [0.0, 0.5, 0.4, 0.9];
        let (upper, lower) = compute_thresholds(&signal, &standard(0.5, -0.5));
        let stream = decide(&signal, &upper, &lower);
        assert_eq!(stream.decisions[1], TradeDecision::Sell);
        assert_eq!(stream.decisions[3], TradeDecision::Sell);
        assert_eq!(stream.sell_steps, vec![1, 3]);
    }

    #[test]
    fn first_step_is_hold() {
        let stream = decide(&[-1.0], &[0.5], &[-0.5]);
        assert_eq!(stream.decisions, vec![TradeDecision::Hold]);
    }

    #[test]
    fn tie_resolves_to_named_constant() {
        // Bounds swap places between steps so both rules fire at t = 1.
        let signal = [0.0, 0.0];
        let upper = [0.5, -0.1];
        let lower = [-0.5, 0.1];
        let stream = decide(&signal, &upper, &lower);
        assert_eq!(stream.decisions[1], CROSSING_TIE_DECISION);
    }

    #[test]
    fn rolling_band_falls_back_before_lookback() {
        let params = ThresholdParams {
            mode: ThresholdMode::RollingBand,
            timeframe: 3,
            band_width: 1.0,
            ..standard(0.5, -0.5)
        };
        let signal = [1.0, -1.0, 1.0, -1.0];
        let (upper, lower) = compute_thresholds(&signal, &params);
        assert_eq!(upper[0], 0.5);
        assert_eq!(lower[1], -0.5);
        // window [1,-1,1]: mean 1/3, population std sqrt(8/9)
        let std = (8.0f64 / 9.0).sqrt();
        assert!((upper[2] - (1.0 / 3.0 + std)).abs() < 1e-12);
        assert!((lower[2] - (1.0 / 3.0 - std)).abs() < 1e-12);
    }

    #[test]
    fn inverted_standard_thresholds_rejected() {
        assert!(standard(-0.5, 0.5).validate().is_err());
        assert!(standard(0.5, -0.5).validate().is_ok());
    }
}
