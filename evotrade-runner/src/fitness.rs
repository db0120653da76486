//! Fitness — scoring one parameter set over one slice of bars.
//!
//! Both modes produce a value on a common "higher is better, 0 is worst" scale:
//! - `NetWorth`: `final_net_worth / initial_net_worth` of a full trade run.
//! - `Confusion`: Buy/Sell accuracy of the decision stream against metalabels.
//!
//! A parameter set that cannot build a signal scores 0.0 instead of failing
//! the generation. Simulator invariant violations are returned as errors.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use evotrade_core::domain::{Bar, TradeDecision};
use evotrade_core::error::{ConfigError, SimulationError};
use evotrade_core::params::ParameterSet;
use evotrade_core::pipeline::build_signal;
use evotrade_core::settings::{ModelSettings, TradebotSettings};
use evotrade_core::simulator::Tradebot;

/// Score assigned to a parameter set whose evaluation hit a configuration error.
pub const WORST_FITNESS: f64 = 0.0;

/// Which quantity the optimizer maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMode {
    #[default]
    NetWorth,
    Confusion,
}

// ─── Confusion matrix ────────────────────────────────────────────────

const LABELS: [TradeDecision; 3] = [TradeDecision::Buy, TradeDecision::Sell, TradeDecision::Hold];

fn label_index(d: TradeDecision) -> usize {
    match d {
        TradeDecision::Buy => 0,
        TradeDecision::Sell => 1,
        TradeDecision::Hold | TradeDecision::StopLoss => 2,
    }
}

/// 3×3 counts of predicted (row) against actual (column) Buy/Sell/Hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 3]; 3],
}

impl ConfusionMatrix {
    /// Pairs predictions with labels step by step; extra steps on either side are ignored.
    pub fn from_decisions(predicted: &[TradeDecision], actual: &[TradeDecision]) -> Self {
        let mut counts = [[0usize; 3]; 3];
        for (&p, &a) in predicted.iter().zip(actual) {
            counts[label_index(p)][label_index(a)] += 1;
        }
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn count(&self, predicted: TradeDecision, actual: TradeDecision) -> usize {
        self.counts[label_index(predicted)][label_index(actual)]
    }

    /// Correct predictions over all steps, 0 for an empty matrix.
    pub fn overall_accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..3).map(|i| self.counts[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Correct Buy/Sell predictions over steps where either side is Buy or Sell.
    pub fn bs_accuracy(&self) -> f64 {
        let hold = label_index(TradeDecision::Hold);
        let relevant = self.total() - self.counts[hold][hold];
        if relevant == 0 {
            return 0.0;
        }
        let correct = self.counts[0][0] + self.counts[1][1];
        correct as f64 / relevant as f64
    }

    pub fn labels() -> [TradeDecision; 3] {
        LABELS
    }
}

// ─── Evaluation ──────────────────────────────────────────────────────

/// Read-only inputs shared by every evaluation in a generation.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub model: &'a ModelSettings,
    pub tradebot: &'a TradebotSettings,
    pub mode: FitnessMode,
    /// Ground-truth decisions aligned with the evaluated bars.
    pub metalabels: Option<&'a [TradeDecision]>,
}

/// Summary of one evaluation, kept on the individual.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub fitness: f64,
    pub initial_net_worth: f64,
    pub final_net_worth: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub stop_loss_count: usize,
    pub bs_accuracy: Option<f64>,
    /// Set when the parameter set could not be evaluated.
    pub config_error: Option<String>,
}

impl Evaluation {
    fn failed(err: &ConfigError) -> Self {
        Self {
            fitness: WORST_FITNESS,
            config_error: Some(err.to_string()),
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.config_error.is_none()
    }
}

fn try_evaluate(
    params: &ParameterSet,
    bars: &[Bar],
    ctx: &EvalContext<'_>,
) -> Result<Result<Evaluation, ConfigError>, SimulationError> {
    let model = match build_signal(bars, params, ctx.model) {
        Ok(model) => model,
        Err(e) => return Ok(Err(e)),
    };

    let mut evaluation = Evaluation::default();
    if ctx.mode == FitnessMode::NetWorth || ctx.metalabels.is_none() {
        let prices: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let run = Tradebot::new(ctx.tradebot).run(&prices, &model.decisions, &model.fused.signal)?;
        evaluation.initial_net_worth = run.initial_net_worth;
        evaluation.final_net_worth = run.final_net_worth();
        evaluation.buy_count = run.buy_count;
        evaluation.sell_count = run.sell_count;
        evaluation.stop_loss_count = run.stop_loss_count;
    }

    if let Some(labels) = ctx.metalabels {
        if labels.len() != bars.len() {
            return Ok(Err(ConfigError::invalid(
                "metalabels",
                format!("{} labels for {} bars", labels.len(), bars.len()),
            )));
        }
        let matrix = ConfusionMatrix::from_decisions(&model.decisions.decisions, labels);
        evaluation.bs_accuracy = Some(matrix.bs_accuracy());
    }

    evaluation.fitness = match ctx.mode {
        FitnessMode::NetWorth => {
            if evaluation.initial_net_worth > 0.0 {
                (evaluation.final_net_worth / evaluation.initial_net_worth).max(0.0)
            } else {
                WORST_FITNESS
            }
        }
        FitnessMode::Confusion => match evaluation.bs_accuracy {
            Some(acc) => acc,
            None => return Ok(Err(ConfigError::missing("fitness", "metalabels"))),
        },
    };
    Ok(Ok(evaluation))
}

/// Score one parameter set. Configuration errors yield [`WORST_FITNESS`].
pub fn evaluate(
    params: &ParameterSet,
    bars: &[Bar],
    ctx: &EvalContext<'_>,
) -> Result<Evaluation, SimulationError> {
    match try_evaluate(params, bars, ctx)? {
        Ok(evaluation) => {
            debug!(
                fitness = evaluation.fitness,
                buys = evaluation.buy_count,
                sells = evaluation.sell_count,
                stop_losses = evaluation.stop_loss_count,
                "individual evaluated"
            );
            Ok(evaluation)
        }
        Err(err) => {
            warn!(error = %err, "parameter set rejected, assigning worst fitness");
            Ok(Evaluation::failed(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{rising_bars, sma_set};
    use TradeDecision::*;

    #[test]
    fn confusion_matrix_counts_and_accuracies() {
        let predicted = [Buy, Hold, Sell, Hold, Buy];
        let actual = [Buy, Hold, Buy, Sell, Hold];
        let m = ConfusionMatrix::from_decisions(&predicted, &actual);
        assert_eq!(m.total(), 5);
        assert_eq!(m.count(Buy, Buy), 1);
        assert_eq!(m.count(Sell, Buy), 1);
        assert_eq!(m.count(Hold, Sell), 1);
        assert!((m.overall_accuracy() - 0.4).abs() < 1e-12);
        // 4 steps involve Buy or Sell on either side, 1 of them is correct.
        assert!((m.bs_accuracy() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn all_hold_has_zero_bs_accuracy() {
        let m = ConfusionMatrix::from_decisions(&[Hold, Hold], &[Hold, Hold]);
        assert_eq!(m.bs_accuracy(), 0.0);
        assert_eq!(m.overall_accuracy(), 1.0);
    }

    #[test]
    fn net_worth_fitness_is_growth_ratio() {
        let bars = rising_bars(50);
        let model = ModelSettings::default();
        let tradebot = TradebotSettings::default();
        let ctx = EvalContext {
            model: &model,
            tradebot: &tradebot,
            mode: FitnessMode::NetWorth,
            metalabels: None,
        };
        let eval = evaluate(&sma_set(2, 5, true), &bars, &ctx).unwrap();
        assert!(eval.is_valid());
        assert_eq!(eval.buy_count, 1);
        assert!(eval.fitness > 1.0);
        assert!((eval.fitness - eval.final_net_worth / eval.initial_net_worth).abs() < 1e-12);
    }

    #[test]
    fn config_error_scores_worst() {
        let bars = rising_bars(30);
        let model = ModelSettings::default();
        let tradebot = TradebotSettings::default();
        let ctx = EvalContext {
            model: &model,
            tradebot: &tradebot,
            mode: FitnessMode::NetWorth,
            metalabels: None,
        };
        let eval = evaluate(&sma_set(9, 3, false), &bars, &ctx).unwrap();
        assert_eq!(eval.fitness, WORST_FITNESS);
        assert!(!eval.is_valid());
    }

    #[test]
    fn confusion_mode_without_labels_scores_worst() {
        let bars = rising_bars(30);
        let model = ModelSettings::default();
        let tradebot = TradebotSettings::default();
        let ctx = EvalContext {
            model: &model,
            tradebot: &tradebot,
            mode: FitnessMode::Confusion,
            metalabels: None,
        };
        let eval = evaluate(&sma_set(2, 5, true), &bars, &ctx).unwrap();
        assert_eq!(eval.fitness, WORST_FITNESS);
    }

    #[test]
    fn confusion_mode_scores_against_labels() {
        let bars = rising_bars(50);
        // The flipped crossover buys at step 4 and never sells.
        let mut labels = vec![Hold; 50];
        labels[4] = Buy;
        labels[40] = Sell;
        let model = ModelSettings::default();
        let tradebot = TradebotSettings::default();
        let ctx = EvalContext {
            model: &model,
            tradebot: &tradebot,
            mode: FitnessMode::Confusion,
            metalabels: Some(&labels),
        };
        let eval = evaluate(&sma_set(2, 5, true), &bars, &ctx).unwrap();
        assert!((eval.fitness - 0.5).abs() < 1e-12);
    }
}
