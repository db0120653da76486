//! Immutable model and tradebot settings.
//!
//! Built once (usually from the run's TOML config) and passed by reference
//! into the pipeline and the simulator.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Signal-model settings shared by every parameter set in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Spline upsampling multiplier; 1 keeps one sample per price step.
    pub interpolation_factor: usize,
    pub volume_std_dev_max: f64,
    pub volatility_std_dev_max: f64,
    /// Modulate the fused signal by the volume and volatility splines.
    pub amplitude_modulation: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            interpolation_factor: 1,
            volume_std_dev_max: 0.2,
            volatility_std_dev_max: 0.2,
            amplitude_modulation: false,
        }
    }
}

impl ModelSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interpolation_factor == 0 {
            return Err(ConfigError::invalid(
                "interpolation_factor",
                "must be >= 1",
            ));
        }
        Ok(())
    }
}

/// How much cash a Buy converts into assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentPolicy {
    /// `fixed_investment`, or all remaining funds when fewer are available.
    FixedAmount,
    /// `investment_percentage` of current funds.
    #[default]
    FixedPercentage,
    /// `fixed_investment * (1 - signal)`.
    ScaledAmount,
    /// `funds * investment_percentage * (1 - signal)`.
    ScaledPercentage,
}

/// How many assets a Sell converts back into cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CashInPolicy {
    #[default]
    FullLiquidation,
    /// `asset_liquidation_percentage` of held assets.
    FixedPercentage,
    /// `assets * asset_liquidation_percentage * (1 + signal)`.
    ScaledPercentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradebotSettings {
    pub initial_funds: f64,
    pub initial_assets: f64,
    pub fixed_investment: f64,
    pub investment_percentage: f64,
    pub asset_liquidation_percentage: f64,
    pub investment_policy: InvestmentPolicy,
    pub cash_in_policy: CashInPolicy,
    /// Liquidate when net worth drops below this fraction of the previous step.
    pub prev_stop_loss: f64,
    /// Liquidate when net worth drops below this fraction of the best so far.
    pub max_stop_loss: f64,
    /// Ceiling on the cash spent by one Buy.
    pub max_investment_per_trade: f64,
}

impl Default for TradebotSettings {
    fn default() -> Self {
        Self {
            initial_funds: 1000.0,
            initial_assets: 0.0,
            fixed_investment: 100.0,
            investment_percentage: 0.3,
            asset_liquidation_percentage: 0.5,
            investment_policy: InvestmentPolicy::FixedPercentage,
            cash_in_policy: CashInPolicy::FullLiquidation,
            prev_stop_loss: 0.85,
            max_stop_loss: 0.75,
            max_investment_per_trade: 50_000.0,
        }
    }
}

impl TradebotSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("initial_funds", self.initial_funds),
            ("initial_assets", self.initial_assets),
            ("fixed_investment", self.fixed_investment),
            ("max_investment_per_trade", self.max_investment_per_trade),
        ];
        for (key, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(key, format!("{value} must be >= 0")));
            }
        }
        let fractions = [
            ("investment_percentage", self.investment_percentage),
            (
                "asset_liquidation_percentage",
                self.asset_liquidation_percentage,
            ),
            ("prev_stop_loss", self.prev_stop_loss),
            ("max_stop_loss", self.max_stop_loss),
        ];
        for (key, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::invalid(
                    key,
                    format!("{value} must lie in [0, 1]"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ModelSettings::default().validate().is_ok());
        assert!(TradebotSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_interpolation_rejected() {
        let settings = ModelSettings {
            interpolation_factor: 0,
            ..ModelSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn stop_loss_above_one_rejected() {
        let settings = TradebotSettings {
            prev_stop_loss: 1.5,
            ..TradebotSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("prev_stop_loss"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings: TradebotSettings =
            toml::from_str("initial_funds = 500.0\ncash_in_policy = \"scaled_percentage\"")
                .unwrap();
        assert_eq!(settings.initial_funds, 500.0);
        assert_eq!(settings.cash_in_policy, CashInPolicy::ScaledPercentage);
        assert_eq!(settings.fixed_investment, 100.0);
    }
}
