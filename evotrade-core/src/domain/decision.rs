//! Discrete per-step trade decisions.

use serde::{Deserialize, Serialize};

/// What the tradebot does at one time step.
///
/// `StopLoss` is never emitted by the threshold engine; the simulator records it
/// when its stop-loss override fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDecision {
    Buy,
    Sell,
    Hold,
    StopLoss,
}

impl TradeDecision {
    pub fn is_trade(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

/// Decisions for every step plus the steps where Buy and Sell trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionStream {
    pub decisions: Vec<TradeDecision>,
    pub buy_steps: Vec<usize>,
    pub sell_steps: Vec<usize>,
}

impl DecisionStream {
    /// Build a stream from raw decisions, indexing the trigger steps.
    pub fn from_decisions(decisions: Vec<TradeDecision>) -> Self {
        let mut buy_steps = Vec::new();
        let mut sell_steps = Vec::new();
        for (i, d) in decisions.iter().enumerate() {
            match d {
                TradeDecision::Buy => buy_steps.push(i),
                TradeDecision::Sell => sell_steps.push(i),
                TradeDecision::Hold | TradeDecision::StopLoss => {}
            }
        }
        Self {
            decisions,
            buy_steps,
            sell_steps,
        }
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn get(&self, step: usize) -> TradeDecision {
        self.decisions
            .get(step)
            .copied()
            .unwrap_or(TradeDecision::Hold)
    }
}
