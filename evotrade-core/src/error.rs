//! Error types shared by the signal pipeline and the trade simulator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parameter set or fusion input that cannot produce a signal.
///
/// Fatal to the evaluation of one parameter set, never to a whole generation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing key '{key}' in '{section}'")]
    MissingKey { section: String, key: String },

    #[error("series matrix has {rows} rows but weight vector has {weights} entries")]
    LengthMismatch { rows: usize, weights: usize },

    #[error("series '{name}' has length {actual}, expected {expected}")]
    RaggedSeries {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("parameter set declares no indicators")]
    NoIndicators,

    #[error("unknown indicator kind '{0}'")]
    UnknownIndicator(String),
}

impl ConfigError {
    pub fn missing(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKey {
            section: section.into(),
            key: key.into(),
        }
    }

    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Account state captured when a simulation invariant breaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub funds: f64,
    pub assets: f64,
    pub net_worth_len: usize,
    pub funds_len: usize,
    pub assets_len: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub stop_loss_count: usize,
}

/// Logic defects detected by the simulator. These abort the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(
        "net-worth history diverged at step {step}: expected {expected} samples, found {actual} ({state:?})"
    )]
    InvariantViolation {
        step: usize,
        expected: usize,
        actual: usize,
        state: AccountSnapshot,
    },

    #[error("decision stream has {decisions} steps but price series has {prices}")]
    LengthMismatch { decisions: usize, prices: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_message_names_section_and_key() {
        let err = ConfigError::missing("weights", "rsi_1");
        assert_eq!(err.to_string(), "missing key 'rsi_1' in 'weights'");
    }

    #[test]
    fn length_mismatch_message() {
        let err = ConfigError::LengthMismatch {
            rows: 3,
            weights: 2,
        };
        assert!(err.to_string().contains("3 rows"));
        assert!(err.to_string().contains("2 entries"));
    }
}
