//! Tradebot — replays a decision stream against an [`Account`].
//!
//! Each step, in order:
//! 1. stop-loss override (liquidate everything) when assets are held and net
//!    worth fell below `max_stop_loss` × best-so-far or `prev_stop_loss` × previous step;
//! 2. otherwise the step's decision, sized by the investment / cash-in policy;
//! 3. one history sample, whatever branch ran.
//!
//! A Buy with no funds and a Sell with nothing to sell degrade to Hold.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::account::Account;
use crate::domain::{DecisionStream, TradeDecision};
use crate::error::SimulationError;
use crate::settings::{CashInPolicy, InvestmentPolicy, TradebotSettings};

/// Risk limits in force for one simulation. Multi-slice runs throttle these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLimits {
    pub prev_stop_loss: f64,
    pub max_stop_loss: f64,
    pub max_investment_per_trade: f64,
}

impl From<&TradebotSettings> for TradeLimits {
    fn from(settings: &TradebotSettings) -> Self {
        Self {
            prev_stop_loss: settings.prev_stop_loss,
            max_stop_loss: settings.max_stop_loss,
            max_investment_per_trade: settings.max_investment_per_trade,
        }
    }
}

/// Outcome of one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRun {
    pub account: Account,
    /// Decision actually applied per step (canceled trades show as Hold).
    pub applied: Vec<TradeDecision>,
    pub buy_count: usize,
    pub sell_count: usize,
    pub stop_loss_count: usize,
    pub stop_loss_steps: Vec<usize>,
    pub initial_net_worth: f64,
    /// Net worth of investing the initial net worth at the first price and holding.
    pub buy_and_hold: Vec<f64>,
    pub buy_and_hold_assets: f64,
}

impl TradeRun {
    pub fn final_net_worth(&self) -> f64 {
        self.account
            .last_net_worth()
            .unwrap_or(self.initial_net_worth)
    }

    pub fn profit_pct(&self) -> f64 {
        if self.initial_net_worth == 0.0 {
            0.0
        } else {
            (self.final_net_worth() - self.initial_net_worth) / self.initial_net_worth * 100.0
        }
    }
}

pub struct Tradebot<'a> {
    settings: &'a TradebotSettings,
    limits: TradeLimits,
    account: Account,
    steps: usize,
    buy_count: usize,
    sell_count: usize,
    stop_loss_count: usize,
    stop_loss_steps: Vec<usize>,
    applied: Vec<TradeDecision>,
    benchmark_assets: Option<f64>,
}

impl<'a> Tradebot<'a> {
    /// Fresh account from the settings' initial funds and assets.
    pub fn new(settings: &'a TradebotSettings) -> Self {
        Self::with_account(
            settings,
            TradeLimits::from(settings),
            settings.initial_funds,
            settings.initial_assets,
        )
    }

    /// Account carried over from a previous slice, with explicit limits.
    pub fn with_account(
        settings: &'a TradebotSettings,
        limits: TradeLimits,
        funds: f64,
        assets: f64,
    ) -> Self {
        Self {
            settings,
            limits,
            account: Account::new(funds, assets),
            steps: 0,
            buy_count: 0,
            sell_count: 0,
            stop_loss_count: 0,
            stop_loss_steps: Vec::new(),
            applied: Vec::new(),
            benchmark_assets: None,
        }
    }

    /// Continue an existing buy-and-hold position instead of opening a new one.
    pub fn resume_benchmark(mut self, assets: f64) -> Self {
        self.benchmark_assets = Some(assets);
        self
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    fn investment_amount(&self, signal: f64) -> f64 {
        let funds = self.account.funds();
        let pct = self.settings.investment_percentage;
        let fixed = self.settings.fixed_investment;
        let amount = match self.settings.investment_policy {
            InvestmentPolicy::FixedAmount => fixed.min(funds),
            InvestmentPolicy::FixedPercentage => funds * pct,
            InvestmentPolicy::ScaledAmount => fixed * (1.0 - signal),
            InvestmentPolicy::ScaledPercentage => funds * pct * (1.0 - signal),
        };
        amount
            .min(self.limits.max_investment_per_trade)
            .min(funds)
            .max(0.0)
    }

    fn assets_to_sell(&self, signal: f64) -> f64 {
        let assets = self.account.assets();
        let pct = self.settings.asset_liquidation_percentage;
        let quantity = match self.settings.cash_in_policy {
            CashInPolicy::FullLiquidation => assets,
            CashInPolicy::FixedPercentage => assets * pct,
            CashInPolicy::ScaledPercentage => assets * pct * (1.0 + signal),
        };
        quantity.min(assets).max(0.0)
    }

    fn stop_loss_triggered(&self, price: f64) -> bool {
        if self.account.assets() <= 0.0 {
            return false;
        }
        let net_worth = self.account.net_worth(price);
        let below_max = self
            .account
            .max_net_worth()
            .is_some_and(|max| net_worth < max * self.limits.max_stop_loss);
        let below_prev = self
            .account
            .last_net_worth()
            .is_some_and(|prev| net_worth < prev * self.limits.prev_stop_loss);
        below_max || below_prev
    }

    /// Process one step and return the decision actually applied.
    pub fn step(
        &mut self,
        price: f64,
        decision: TradeDecision,
        signal: f64,
    ) -> Result<TradeDecision, SimulationError> {
        let step = self.steps;
        let applied = if self.stop_loss_triggered(price) {
            let held = self.account.assets();
            self.account.convert_assets_to_funds(price, held);
            self.stop_loss_count += 1;
            self.stop_loss_steps.push(step);
            debug!(step, price, sold = held, "stop-loss triggered");
            TradeDecision::StopLoss
        } else {
            match decision {
                TradeDecision::Buy => {
                    let amount = self.investment_amount(signal);
                    if self.account.funds() > 0.0 && amount > 0.0 {
                        let spent = self.account.convert_funds_to_assets(price, amount);
                        self.buy_count += 1;
                        debug!(step, price, spent, "buy");
                        TradeDecision::Buy
                    } else {
                        debug!(step, funds = self.account.funds(), "buy canceled");
                        TradeDecision::Hold
                    }
                }
                TradeDecision::Sell => {
                    let quantity = self.assets_to_sell(signal);
                    if self.account.assets() > 0.0 && quantity > 0.0 {
                        let sold = self.account.convert_assets_to_funds(price, quantity);
                        self.sell_count += 1;
                        debug!(step, price, sold, "sell");
                        TradeDecision::Sell
                    } else {
                        debug!(step, "sell canceled, nothing to sell");
                        TradeDecision::Hold
                    }
                }
                TradeDecision::Hold | TradeDecision::StopLoss => TradeDecision::Hold,
            }
        };
        self.account.record(price);
        self.steps += 1;
        self.applied.push(applied);
        self.check_history(step)?;
        Ok(applied)
    }

    fn check_history(&self, step: usize) -> Result<(), SimulationError> {
        verify_history(
            &self.account,
            self.steps,
            step,
            (self.buy_count, self.sell_count, self.stop_loss_count),
        )
    }

    /// Replay a whole decision stream over `prices`.
    ///
    /// `signal` supplies the strength used by the scaled policies; missing
    /// samples count as 0.
    pub fn run(
        mut self,
        prices: &[f64],
        decisions: &DecisionStream,
        signal: &[f64],
    ) -> Result<TradeRun, SimulationError> {
        if decisions.len() != prices.len() {
            return Err(SimulationError::LengthMismatch {
                decisions: decisions.len(),
                prices: prices.len(),
            });
        }
        let first_price = prices.first().copied().unwrap_or(0.0);
        let initial_net_worth = self.account.net_worth(first_price);
        let benchmark_assets = match self.benchmark_assets {
            Some(assets) => assets,
            None if first_price > 0.0 => initial_net_worth / first_price,
            None => 0.0,
        };

        for (t, &price) in prices.iter().enumerate() {
            let strength = signal.get(t).copied().unwrap_or(0.0);
            self.step(price, decisions.get(t), strength)?;
        }

        Ok(TradeRun {
            buy_and_hold: prices.iter().map(|p| benchmark_assets * p).collect(),
            buy_and_hold_assets: benchmark_assets,
            initial_net_worth,
            account: self.account,
            applied: self.applied,
            buy_count: self.buy_count,
            sell_count: self.sell_count,
            stop_loss_count: self.stop_loss_count,
            stop_loss_steps: self.stop_loss_steps,
        })
    }
}

/// Fail unless every history holds exactly `steps_processed` samples.
pub fn verify_history(
    account: &Account,
    steps_processed: usize,
    step: usize,
    (buy_count, sell_count, stop_loss_count): (usize, usize, usize),
) -> Result<(), SimulationError> {
    let lens = [
        account.net_worth_history().len(),
        account.funds_history().len(),
        account.assets_history().len(),
    ];
    if let Some(&actual) = lens.iter().find(|&&len| len != steps_processed) {
        let state = account.snapshot(buy_count, sell_count, stop_loss_count);
        error!(step, expected = steps_processed, actual, ?state, "account history diverged");
        return Err(SimulationError::InvariantViolation {
            step,
            expected: steps_processed,
            actual,
            state,
        });
    }
    Ok(())
}
