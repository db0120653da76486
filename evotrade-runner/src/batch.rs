//! Batch simulation — replay stored parameter sets over many tickers.
//!
//! Tickers without a stored set are skipped, tickers whose data or parameters
//! fail are reported and left out. Only a simulator invariant violation stops
//! the batch.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use evotrade_core::error::SimulationError;

use crate::config::RunConfig;
use crate::data_loader::PriceSource;
use crate::store::{load_parameter_sets, ParameterStore, StoreError};
use crate::trade_sim::{run_trade_simulation, TradeSimError, TradeSimReport};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// A ticker that had a parameter set but could not be simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTicker {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub reports: Vec<TradeSimReport>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedTicker>,
}

impl BatchReport {
    /// Mean profit over the simulated tickers, 0 when none ran.
    pub fn mean_profit_pct(&self) -> f64 {
        if self.reports.is_empty() {
            return 0.0;
        }
        self.reports.iter().map(|r| r.profit_pct).sum::<f64>() / self.reports.len() as f64
    }
}

/// Simulate the stored set of every configured ticker.
pub fn run_batch(
    config: &RunConfig,
    source: &dyn PriceSource,
    store: &dyn ParameterStore,
) -> Result<BatchReport, BatchError> {
    let loaded = load_parameter_sets(store, &config.tickers, &config.run_id)?;
    let mut batch = BatchReport {
        skipped: loaded.skipped,
        ..BatchReport::default()
    };

    for (ticker, params) in loaded.tickers.iter().zip(&loaded.sets) {
        let window = match source.fetch(ticker) {
            Ok(window) => window,
            Err(e) => {
                warn!(ticker = %ticker, source = source.name(), error = %e, "price data unavailable");
                batch.failed.push(FailedTicker {
                    ticker: ticker.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let result = run_trade_simulation(
            &window,
            params,
            &config.model,
            &config.tradebot,
            &config.trade_sim,
            None,
        );
        match result {
            Ok(report) => batch.reports.push(report),
            Err(TradeSimError::Simulation(e)) => return Err(e.into()),
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "simulation skipped");
                batch.failed.push(FailedTicker {
                    ticker: ticker.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        simulated = batch.reports.len(),
        skipped = batch.skipped.len(),
        failed = batch.failed.len(),
        mean_profit_pct = batch.mean_profit_pct(),
        "batch finished"
    );
    Ok(batch)
}
