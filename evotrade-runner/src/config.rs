//! Run configuration, loaded once from TOML and shared read-only.
//!
//! A run file groups every setting an optimizer or simulation run needs:
//!
//! ```toml
//! run_id = "1"
//! tickers = ["AAPL", "MSFT"]
//! master_seed = 42
//!
//! [model]
//! interpolation_factor = 1
//!
//! [tradebot]
//! initial_funds = 1000.0
//! investment_policy = "fixed_percentage"
//!
//! [evolution]
//! population_size = 20
//! generations = 10
//!
//! [data_slice]
//! slice_size = 200
//! shift_per_generation = 10
//!
//! [trade_sim]
//! slice_size = 100
//!
//! [paths]
//! price_dir = "data/prices"
//! ```
//!
//! Every section is optional and falls back to its `Default`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use evotrade_core::error::ConfigError;
use evotrade_core::params::ParameterRanges;
use evotrade_core::settings::{ModelSettings, TradebotSettings};
use evotrade_core::throttle::{throttle, DecayMode};

use crate::fitness::FitnessMode;

/// Errors raised while loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
}

// ─── Sections ────────────────────────────────────────────────────────

/// Population sizing and search schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Parents kept at generation 0; throttled toward `min_parents`.
    pub max_parents: usize,
    pub min_parents: usize,
    pub parents_decay: DecayMode,
    /// Random immigrants at generation 0; throttled toward `min_random`.
    pub max_random: usize,
    pub min_random: usize,
    pub random_decay: DecayMode,
    /// Fraction of an offspring's leaves redrawn per reproduction.
    pub mutation_rate: f64,
    /// Evaluation threads. 1 evaluates sequentially on the calling thread.
    pub workers: usize,
    pub fitness: FitnessMode,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 10,
            max_parents: 6,
            min_parents: 2,
            parents_decay: DecayMode::Linear,
            max_random: 4,
            min_random: 1,
            random_decay: DecayMode::Linear,
            mutation_rate: 0.2,
            workers: 1,
            fitness: FitnessMode::NetWorth,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::invalid("evolution.population_size", "must be >= 1"));
        }
        if self.generations == 0 {
            return Err(ConfigError::invalid("evolution.generations", "must be >= 1"));
        }
        if self.max_parents == 0 || self.min_parents == 0 {
            return Err(ConfigError::invalid(
                "evolution.min_parents",
                "at least one parent must survive each generation",
            ));
        }
        if self.min_parents > self.max_parents || self.min_random > self.max_random {
            return Err(ConfigError::invalid(
                "evolution",
                "min_parents/min_random must not exceed max_parents/max_random",
            ));
        }
        if self.max_parents + self.max_random > self.population_size {
            return Err(ConfigError::invalid(
                "evolution.population_size",
                format!(
                    "{} parents + {} immigrants exceed a population of {}",
                    self.max_parents, self.max_random, self.population_size
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::invalid(
                "evolution.mutation_rate",
                format!("{} is outside [0, 1]", self.mutation_rate),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::invalid("evolution.workers", "must be >= 1"));
        }
        Ok(())
    }
}

/// Where each optimizer generation reads its bars from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSliceConfig {
    pub start_index: usize,
    pub slice_size: usize,
    /// Steps the slice moves forward after every generation.
    pub shift_per_generation: usize,
    /// Wrap back to `start_index` instead of stopping at the end of the window.
    pub looping: bool,
}

impl Default for DataSliceConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            slice_size: 200,
            shift_per_generation: 10,
            looping: true,
        }
    }
}

/// A value that moves from `start` to `end` over a number of steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub decay: DecayMode,
}

impl Schedule {
    pub const fn constant(value: f64) -> Self {
        Self {
            start: value,
            end: value,
            decay: DecayMode::Constant,
        }
    }

    pub fn at(&self, step: usize, total_steps: usize) -> f64 {
        throttle(step, total_steps, self.start, self.end, self.decay)
    }
}

/// Multi-slice trade simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeSimConfig {
    pub start_index: usize,
    /// Exclusive end of the simulated range; the whole window when absent.
    pub end_index: Option<usize>,
    pub slice_size: usize,
    pub prev_stop_loss: Schedule,
    pub max_stop_loss: Schedule,
    /// Ceiling per Buy, as a fraction of net worth at the start of each slice.
    pub investment_per_trade: Schedule,
}

impl Default for TradeSimConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            end_index: None,
            slice_size: 100,
            prev_stop_loss: Schedule::constant(0.85),
            max_stop_loss: Schedule::constant(0.75),
            investment_per_trade: Schedule::constant(0.5),
        }
    }
}

impl TradeSimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slice_size == 0 {
            return Err(ConfigError::invalid("trade_sim.slice_size", "must be >= 1"));
        }
        if let Some(end) = self.end_index {
            if end <= self.start_index {
                return Err(ConfigError::invalid(
                    "trade_sim.end_index",
                    format!("{end} must be after start_index {}", self.start_index),
                ));
            }
        }
        let stop_losses = [
            ("trade_sim.prev_stop_loss", self.prev_stop_loss),
            ("trade_sim.max_stop_loss", self.max_stop_loss),
        ];
        for (key, s) in stop_losses {
            if ![s.start, s.end].iter().all(|v| (0.0..=1.0).contains(v)) {
                return Err(ConfigError::invalid(
                    key,
                    format!("stop-loss ratios {}..{} must be in [0, 1]", s.start, s.end),
                ));
            }
        }
        let ceiling = self.investment_per_trade;
        if !(ceiling.start.is_finite() && ceiling.end.is_finite())
            || ceiling.start < 0.0
            || ceiling.end < 0.0
        {
            return Err(ConfigError::invalid(
                "trade_sim.investment_per_trade",
                "schedule values must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// File locations used by the file-backed sources and stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of `<TICKER>.csv` files; synthetic prices when absent.
    pub price_dir: Option<PathBuf>,
    pub store_dir: PathBuf,
    /// Store sub-directory grouping runs of the same horizon.
    pub term: String,
    pub output_dir: PathBuf,
    /// Optional metalabel CSV, required by the confusion fitness mode.
    pub metalabels: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            price_dir: None,
            store_dir: PathBuf::from("data/parameter_sets"),
            term: "short_term".to_string(),
            output_dir: PathBuf::from("results"),
            metalabels: None,
        }
    }
}

// ─── RunConfig ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run_id: String,
    pub tickers: Vec<String>,
    pub master_seed: u64,
    /// Bars generated per ticker by the synthetic price source.
    pub synthetic_len: usize,
    pub model: ModelSettings,
    pub tradebot: TradebotSettings,
    pub ranges: ParameterRanges,
    pub evolution: EvolutionConfig,
    pub data_slice: DataSliceConfig,
    pub trade_sim: TradeSimConfig,
    pub paths: PathsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: "1".to_string(),
            tickers: Vec::new(),
            master_seed: 42,
            synthetic_len: 750,
            model: ModelSettings::default(),
            tradebot: TradebotSettings::default(),
            ranges: ParameterRanges::default(),
            evolution: EvolutionConfig::default(),
            data_slice: DataSliceConfig::default(),
            trade_sim: TradeSimConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, RunConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, RunConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run_id.trim().is_empty() {
            return Err(ConfigError::invalid("run_id", "must not be empty"));
        }
        if self.data_slice.slice_size == 0 {
            return Err(ConfigError::invalid("data_slice.slice_size", "must be >= 1"));
        }
        self.model.validate()?;
        self.tradebot.validate()?;
        self.ranges.validate()?;
        self.evolution.validate()?;
        self.trade_sim.validate()
    }

    /// Content hash of the configuration, for tagging exported results.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let text = r#"
            run_id = "7"
            tickers = ["AAPL"]

            [evolution]
            population_size = 12
            workers = 4
            fitness = "confusion"

            [tradebot]
            investment_policy = "scaled_amount"

            [trade_sim.prev_stop_loss]
            start = 0.8
            end = 0.9
            decay = "linear"
        "#;
        let config = RunConfig::from_toml_str(text).unwrap();
        assert_eq!(config.run_id, "7");
        assert_eq!(config.evolution.population_size, 12);
        assert_eq!(config.evolution.workers, 4);
        assert_eq!(config.evolution.fitness, FitnessMode::Confusion);
        assert_eq!(config.evolution.generations, 10);
        assert_eq!(
            config.tradebot.investment_policy,
            evotrade_core::settings::InvestmentPolicy::ScaledAmount
        );
        assert_eq!(config.trade_sim.prev_stop_loss.decay, DecayMode::Linear);
        assert_eq!(config.trade_sim.max_stop_loss, Schedule::constant(0.75));
    }

    #[test]
    fn oversized_parent_pool_rejected() {
        let text = r#"
            [evolution]
            population_size = 5
            max_parents = 4
            max_random = 2
        "#;
        let err = RunConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, RunConfigError::Invalid(_)));
    }

    #[test]
    fn nan_parameter_range_rejected() {
        let text = "[ranges.weight]\nmin = 0.0\nmax = nan\n";
        let err = RunConfig::from_toml_str(text).unwrap_err();
        match err {
            RunConfigError::Invalid(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "ranges.weight")
            }
            other => panic!("unexpected: {other:?}"),
        }

        let text = "[ranges.timeframe]\nmin = 5.0\nmax = inf\n";
        assert!(matches!(
            RunConfig::from_toml_str(text),
            Err(RunConfigError::Invalid(_))
        ));
    }

    #[test]
    fn stop_loss_schedules_are_ratios() {
        let mut config = RunConfig::default();
        config.trade_sim.prev_stop_loss = Schedule::constant(1.5);
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.trade_sim.max_stop_loss = Schedule {
            start: 0.9,
            end: -0.1,
            decay: DecayMode::Linear,
        };
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.trade_sim.max_stop_loss = Schedule::constant(1.0);
        config.trade_sim.investment_per_trade = Schedule::constant(2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = RunConfig::from_toml_str("[evolution\npopulation_size = 3").unwrap_err();
        assert!(matches!(err, RunConfigError::Parse(_)));
    }

    #[test]
    fn schedule_interpolates() {
        let s = Schedule {
            start: 0.8,
            end: 0.9,
            decay: DecayMode::Linear,
        };
        assert_eq!(s.at(0, 4), 0.8);
        assert!((s.at(2, 4) - 0.85).abs() < 1e-12);
        assert_eq!(s.at(4, 4), 0.9);
        assert_eq!(Schedule::constant(0.5).at(3, 4), 0.5);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = RunConfig::default();
        let mut b = a.clone();
        b.master_seed = 7;
        assert_eq!(a.fingerprint().unwrap(), a.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
