//! Account — funds, assets and per-step history.

use serde::{Deserialize, Serialize};

use crate::error::AccountSnapshot;

/// Mutable simulation state owned by exactly one tradebot.
///
/// Every step ends with exactly one call to [`Account::record`], so each
/// history holds one sample per processed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    initial_funds: f64,
    initial_assets: f64,
    funds: f64,
    assets: f64,
    net_worth_history: Vec<f64>,
    funds_history: Vec<f64>,
    assets_history: Vec<f64>,
}

impl Account {
    pub fn new(initial_funds: f64, initial_assets: f64) -> Self {
        Self {
            initial_funds,
            initial_assets,
            funds: initial_funds,
            assets: initial_assets,
            net_worth_history: Vec::new(),
            funds_history: Vec::new(),
            assets_history: Vec::new(),
        }
    }

    pub fn initial_funds(&self) -> f64 {
        self.initial_funds
    }

    pub fn initial_assets(&self) -> f64 {
        self.initial_assets
    }

    pub fn funds(&self) -> f64 {
        self.funds
    }

    pub fn assets(&self) -> f64 {
        self.assets
    }

    pub fn net_worth(&self, price: f64) -> f64 {
        self.funds + self.assets * price
    }

    pub fn net_worth_history(&self) -> &[f64] {
        &self.net_worth_history
    }

    pub fn funds_history(&self) -> &[f64] {
        &self.funds_history
    }

    pub fn assets_history(&self) -> &[f64] {
        &self.assets_history
    }

    pub fn last_net_worth(&self) -> Option<f64> {
        self.net_worth_history.last().copied()
    }

    pub fn max_net_worth(&self) -> Option<f64> {
        self.net_worth_history.iter().copied().reduce(f64::max)
    }

    /// Spend up to `amount` of funds on assets at `price`. Returns the cash spent.
    pub fn convert_funds_to_assets(&mut self, price: f64, amount: f64) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        let spent = amount.clamp(0.0, self.funds);
        self.funds -= spent;
        self.assets += spent / price;
        spent
    }

    /// Sell up to `quantity` assets at `price`. Returns the quantity sold.
    pub fn convert_assets_to_funds(&mut self, price: f64, quantity: f64) -> f64 {
        let sold = quantity.clamp(0.0, self.assets);
        self.assets -= sold;
        self.funds += sold * price;
        sold
    }

    /// Close the step: append net worth, funds and assets at `price`.
    pub fn record(&mut self, price: f64) {
        self.net_worth_history.push(self.net_worth(price));
        self.funds_history.push(self.funds);
        self.assets_history.push(self.assets);
    }

    pub fn snapshot(&self, buy_count: usize, sell_count: usize, stop_loss_count: usize) -> AccountSnapshot {
        AccountSnapshot {
            funds: self.funds,
            assets: self.assets,
            net_worth_len: self.net_worth_history.len(),
            funds_len: self.funds_history.len(),
            assets_len: self.assets_history.len(),
            buy_count,
            sell_count,
            stop_loss_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_then_sell_roundtrip() {
        let mut account = Account::new(1000.0, 0.0);
        assert_eq!(account.convert_funds_to_assets(10.0, 300.0), 300.0);
        assert_eq!(account.funds(), 700.0);
        assert_eq!(account.assets(), 30.0);
        assert_eq!(account.convert_assets_to_funds(20.0, 30.0), 30.0);
        assert_eq!(account.funds(), 1300.0);
        assert_eq!(account.assets(), 0.0);
    }

    #[test]
    fn conversions_capped_by_holdings() {
        let mut account = Account::new(100.0, 2.0);
        assert_eq!(account.convert_funds_to_assets(10.0, 500.0), 100.0);
        assert_eq!(account.funds(), 0.0);
        assert_eq!(account.convert_assets_to_funds(10.0, 50.0), 12.0);
        assert_eq!(account.assets(), 0.0);
    }

    #[test]
    fn record_appends_all_histories() {
        let mut account = Account::new(100.0, 1.0);
        account.record(50.0);
        account.record(60.0);
        assert_eq!(account.net_worth_history(), &[150.0, 160.0]);
        assert_eq!(account.funds_history(), &[100.0, 100.0]);
        assert_eq!(account.assets_history(), &[1.0, 1.0]);
        assert_eq!(account.max_net_worth(), Some(160.0));
        assert_eq!(account.last_net_worth(), Some(160.0));
    }

    #[test]
    fn empty_history_has_no_max() {
        assert_eq!(Account::new(1.0, 0.0).max_net_worth(), None);
    }
}
