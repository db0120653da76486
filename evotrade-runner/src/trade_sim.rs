//! Multi-slice trade simulation of one parameter set over one price window.
//!
//! The window range `start_index..end_index` is cut into consecutive slices of
//! `slice_size` steps. For every slice the signal is rebuilt from that slice's
//! bars and a tradebot resumes from the previous slice's funds and assets.
//! Risk limits follow their schedules from slice to slice; the investment
//! ceiling is a fraction of the net worth at the start of the slice.
//!
//! With metalabels, a second account trades the label stream under the same
//! policy and the predicted decisions are scored against the labels.

use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use evotrade_core::domain::{DecisionStream, PriceWindow, TradeDecision, WindowError};
use evotrade_core::error::{ConfigError, SimulationError};
use evotrade_core::params::ParameterSet;
use evotrade_core::pipeline::build_signal;
use evotrade_core::settings::{ModelSettings, TradebotSettings};
use evotrade_core::simulator::{TradeLimits, TradeRun, Tradebot};

use crate::config::TradeSimConfig;
use crate::data_slice::subslices;
use crate::fitness::ConfusionMatrix;

#[derive(Debug, Error)]
pub enum TradeSimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("price window: {0}")]
    Window(#[from] WindowError),

    #[error("{labels} metalabels supplied for a window of {bars} bars")]
    MetalabelLength { labels: usize, bars: usize },
}

/// Limits and result of one simulation slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceReport {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub limits: TradeLimits,
    pub initial_net_worth: f64,
    pub final_net_worth: f64,
    pub profit_pct: f64,
}

/// Flat per-run record for rendering or persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSimReport {
    pub ticker: String,
    pub initial_net_worth: f64,
    pub final_net_worth: f64,
    pub profit_pct: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub stop_loss_count: usize,
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    pub net_worth: Vec<f64>,
    pub funds: Vec<f64>,
    pub assets: Vec<f64>,
    pub buy_and_hold: Vec<f64>,
    pub signal: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    /// Decision applied at each step, stop-losses included.
    pub decisions: Vec<TradeDecision>,
    pub slices: Vec<SliceReport>,
    /// Net worth of the account trading the metalabels.
    pub metalabel_net_worth: Option<Vec<f64>>,
    pub confusion: Option<ConfusionMatrix>,
}

impl TradeSimReport {
    fn empty(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            initial_net_worth: 0.0,
            final_net_worth: 0.0,
            profit_pct: 0.0,
            buy_count: 0,
            sell_count: 0,
            stop_loss_count: 0,
            dates: Vec::new(),
            prices: Vec::new(),
            net_worth: Vec::new(),
            funds: Vec::new(),
            assets: Vec::new(),
            buy_and_hold: Vec::new(),
            signal: Vec::new(),
            upper: Vec::new(),
            lower: Vec::new(),
            decisions: Vec::new(),
            slices: Vec::new(),
            metalabel_net_worth: None,
            confusion: None,
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn append(&mut self, run: &TradeRun) {
        self.net_worth.extend_from_slice(run.account.net_worth_history());
        self.funds.extend_from_slice(run.account.funds_history());
        self.assets.extend_from_slice(run.account.assets_history());
        self.buy_and_hold.extend_from_slice(&run.buy_and_hold);
        self.decisions.extend_from_slice(&run.applied);
        self.buy_count += run.buy_count;
        self.sell_count += run.sell_count;
        self.stop_loss_count += run.stop_loss_count;
    }
}

/// Funds and assets handed from one slice to the next.
#[derive(Debug, Clone, Copy)]
struct Carry {
    funds: f64,
    assets: f64,
    benchmark_assets: Option<f64>,
}

impl Carry {
    fn net_worth(&self, price: f64) -> f64 {
        self.funds + self.assets * price
    }

    fn after(run: &TradeRun) -> Self {
        Self {
            funds: run.account.funds(),
            assets: run.account.assets(),
            benchmark_assets: Some(run.buy_and_hold_assets),
        }
    }
}

fn limits_for(sim: &TradeSimConfig, slice: usize, nb_slices: usize, net_worth: f64) -> TradeLimits {
    TradeLimits {
        prev_stop_loss: sim.prev_stop_loss.at(slice, nb_slices),
        max_stop_loss: sim.max_stop_loss.at(slice, nb_slices),
        max_investment_per_trade: sim.investment_per_trade.at(slice, nb_slices) * net_worth,
    }
}

fn run_slice(
    settings: &TradebotSettings,
    limits: TradeLimits,
    carry: Carry,
    prices: &[f64],
    decisions: &DecisionStream,
    signal: &[f64],
) -> Result<TradeRun, SimulationError> {
    let mut bot = Tradebot::with_account(settings, limits, carry.funds, carry.assets);
    if let Some(assets) = carry.benchmark_assets {
        bot = bot.resume_benchmark(assets);
    }
    bot.run(prices, decisions, signal)
}

fn sim_range(window: &PriceWindow, sim: &TradeSimConfig) -> Result<Range<usize>, WindowError> {
    let end = sim.end_index.unwrap_or(window.len()).min(window.len());
    if sim.start_index >= end {
        return Err(WindowError::SliceOutOfRange {
            start: sim.start_index,
            len: end.saturating_sub(sim.start_index),
            available: window.len(),
        });
    }
    Ok(sim.start_index..end)
}

/// Simulate `params` over `window` slice by slice.
pub fn run_trade_simulation(
    window: &PriceWindow,
    params: &ParameterSet,
    model: &ModelSettings,
    tradebot: &TradebotSettings,
    sim: &TradeSimConfig,
    metalabels: Option<&[TradeDecision]>,
) -> Result<TradeSimReport, TradeSimError> {
    sim.validate()?;
    tradebot.validate()?;
    if let Some(labels) = metalabels {
        if labels.len() != window.len() {
            return Err(TradeSimError::MetalabelLength {
                labels: labels.len(),
                bars: window.len(),
            });
        }
    }

    let range = sim_range(window, sim)?;
    let slices = subslices(range.start, range.end, sim.slice_size);
    let nb_slices = slices.len();
    let mut report = TradeSimReport::empty(window.ticker());
    let mut predicted: Vec<TradeDecision> = Vec::with_capacity(range.len());
    let mut metalabel_net_worth: Vec<f64> = Vec::new();

    let initial = Carry {
        funds: tradebot.initial_funds,
        assets: tradebot.initial_assets,
        benchmark_assets: None,
    };
    let mut carry = initial;
    let mut label_carry = initial;

    for (k, slice) in slices.into_iter().enumerate() {
        let bars = &window.bars()[slice.clone()];
        let prices: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let signal_model = build_signal(bars, params, model)?;

        let limits = limits_for(sim, k, nb_slices, carry.net_worth(prices[0]));
        let run = run_slice(
            tradebot,
            limits,
            carry,
            &prices,
            &signal_model.decisions,
            &signal_model.fused.signal,
        )?;

        if k == 0 {
            report.initial_net_worth = run.initial_net_worth;
        }
        info!(
            ticker = window.ticker(),
            slice = k,
            start = slice.start,
            end = slice.end,
            prev_stop_loss = limits.prev_stop_loss,
            max_stop_loss = limits.max_stop_loss,
            max_investment = limits.max_investment_per_trade,
            profit_pct = run.profit_pct(),
            "simulation slice done"
        );
        report.slices.push(SliceReport {
            index: k,
            start: slice.start,
            end: slice.end,
            limits,
            initial_net_worth: run.initial_net_worth,
            final_net_worth: run.final_net_worth(),
            profit_pct: run.profit_pct(),
        });
        report.append(&run);
        carry = Carry::after(&run);

        if let Some(labels) = metalabels {
            let stream = DecisionStream::from_decisions(labels[slice.clone()].to_vec());
            let label_limits = limits_for(sim, k, nb_slices, label_carry.net_worth(prices[0]));
            let label_run = run_slice(tradebot, label_limits, label_carry, &prices, &stream, &[])?;
            debug!(slice = k, profit_pct = label_run.profit_pct(), "metalabel slice done");
            metalabel_net_worth.extend_from_slice(label_run.account.net_worth_history());
            label_carry = Carry::after(&label_run);
        }

        report.dates.extend(bars.iter().map(|b| b.date));
        report.prices.extend_from_slice(&prices);
        report.signal.extend_from_slice(&signal_model.fused.signal);
        report.upper.extend_from_slice(&signal_model.fused.upper);
        report.lower.extend_from_slice(&signal_model.fused.lower);
        predicted.extend_from_slice(&signal_model.decisions.decisions);
    }

    report.final_net_worth = report
        .net_worth
        .last()
        .copied()
        .unwrap_or(report.initial_net_worth);
    report.profit_pct = if report.initial_net_worth == 0.0 {
        0.0
    } else {
        (report.final_net_worth - report.initial_net_worth) / report.initial_net_worth * 100.0
    };
    if let Some(labels) = metalabels {
        report.confusion = Some(ConfusionMatrix::from_decisions(&predicted, &labels[range]));
        report.metalabel_net_worth = Some(metalabel_net_worth);
    }

    info!(
        ticker = window.ticker(),
        slices = nb_slices,
        final_net_worth = report.final_net_worth,
        profit_pct = report.profit_pct,
        buys = report.buy_count,
        sells = report.sell_count,
        stop_losses = report.stop_loss_count,
        "trade simulation finished"
    );
    Ok(report)
}
