//! Reporting and export — JSON, CSV and Markdown artifacts.
//!
//! Formats:
//! - **JSON**: full simulation reports and optimizer results
//! - **CSV**: per-step series, per-slice results, per-generation stats, batch summary
//! - **Markdown**: short human-readable summary of one simulation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use evotrade_core::domain::TradeDecision;

use crate::batch::BatchReport;
use crate::optimizer::{GenerationStats, OptimizerResult};
use crate::trade_sim::{SliceReport, TradeSimReport};

fn decision_label(d: TradeDecision) -> &'static str {
    match d {
        TradeDecision::Buy => "buy",
        TradeDecision::Sell => "sell",
        TradeDecision::Hold => "hold",
        TradeDecision::StopLoss => "stop_loss",
    }
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_report_json(report: &TradeSimReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize TradeSimReport to JSON")
}

pub fn import_report_json(json: &str) -> Result<TradeSimReport> {
    serde_json::from_str(json).context("failed to deserialize TradeSimReport from JSON")
}

pub fn export_optimizer_json(result: &OptimizerResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize OptimizerResult to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per simulated step.
///
/// Columns: step, date, price, net_worth, funds, assets, buy_and_hold, signal,
/// upper, lower, decision
pub fn export_steps_csv(report: &TradeSimReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "step",
        "date",
        "price",
        "net_worth",
        "funds",
        "assets",
        "buy_and_hold",
        "signal",
        "upper",
        "lower",
        "decision",
    ])?;

    for t in 0..report.len() {
        wtr.write_record([
            &t.to_string(),
            &report.dates[t].to_string(),
            &format!("{:.6}", report.prices[t]),
            &format!("{:.2}", report.net_worth[t]),
            &format!("{:.2}", report.funds[t]),
            &format!("{:.6}", report.assets[t]),
            &format!("{:.2}", report.buy_and_hold[t]),
            &format!("{:.6}", report.signal[t]),
            &format!("{:.6}", report.upper[t]),
            &format!("{:.6}", report.lower[t]),
            &decision_label(report.decisions[t]).to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_slices_csv(slices: &[SliceReport]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "slice",
        "start",
        "end",
        "prev_stop_loss",
        "max_stop_loss",
        "max_investment_per_trade",
        "initial_net_worth",
        "final_net_worth",
        "profit_pct",
    ])?;
    for s in slices {
        wtr.write_record([
            &s.index.to_string(),
            &s.start.to_string(),
            &s.end.to_string(),
            &format!("{:.4}", s.limits.prev_stop_loss),
            &format!("{:.4}", s.limits.max_stop_loss),
            &format!("{:.2}", s.limits.max_investment_per_trade),
            &format!("{:.2}", s.initial_net_worth),
            &format!("{:.2}", s.final_net_worth),
            &format!("{:.4}", s.profit_pct),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_generations_csv(stats: &[GenerationStats]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "generation",
        "best_fitness",
        "mean_fitness",
        "nb_parents",
        "nb_random",
        "slice_start",
        "slice_end",
        "config_errors",
    ])?;
    for g in stats {
        wtr.write_record([
            &g.generation.to_string(),
            &format!("{:.6}", g.best_fitness),
            &format!("{:.6}", g.mean_fitness),
            &g.nb_parents.to_string(),
            &g.nb_random.to_string(),
            &g.slice_start.to_string(),
            &g.slice_end.to_string(),
            &g.config_errors.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per simulated ticker, then skipped and failed tickers.
pub fn export_batch_csv(batch: &BatchReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "status",
        "final_net_worth",
        "profit_pct",
        "buys",
        "sells",
        "stop_losses",
    ])?;
    for r in &batch.reports {
        wtr.write_record([
            r.ticker.as_str(),
            "simulated",
            &format!("{:.2}", r.final_net_worth),
            &format!("{:.4}", r.profit_pct),
            &r.buy_count.to_string(),
            &r.sell_count.to_string(),
            &r.stop_loss_count.to_string(),
        ])?;
    }
    for ticker in &batch.skipped {
        wtr.write_record([ticker.as_str(), "skipped", "", "", "", "", ""])?;
    }
    for f in &batch.failed {
        wtr.write_record([f.ticker.as_str(), "failed", "", "", "", "", ""])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundles ───────────────────────────────────────────────

fn artifact_dir(output_dir: &Path, name: &str) -> Result<PathBuf> {
    let dirname = format!("{}_{}", name, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;
    Ok(run_dir)
}

/// Save one simulation under `{ticker}_{timestamp}/`:
/// - `report.json` — the full `TradeSimReport`
/// - `steps.csv` — per-step series
/// - `slices.csv` — per-slice limits and profit
/// - `summary.md` — readable summary
pub fn save_simulation_artifacts(report: &TradeSimReport, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = artifact_dir(output_dir, &report.ticker)?;
    std::fs::write(run_dir.join("report.json"), export_report_json(report)?)?;
    std::fs::write(run_dir.join("steps.csv"), export_steps_csv(report)?)?;
    std::fs::write(run_dir.join("slices.csv"), export_slices_csv(&report.slices)?)?;
    std::fs::write(run_dir.join("summary.md"), generate_summary(report))?;
    Ok(run_dir)
}

/// Save one optimizer run under `{ticker}_opt_{timestamp}/`:
/// - `result.json` — best individual, per-generation stats and final population
/// - `generations.csv` — per-generation stats
/// - `best_parameter_set.json` — best set in its persisted form
pub fn save_optimizer_artifacts(result: &OptimizerResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = artifact_dir(output_dir, &format!("{}_opt", result.ticker))?;
    std::fs::write(run_dir.join("result.json"), export_optimizer_json(result)?)?;
    std::fs::write(
        run_dir.join("generations.csv"),
        export_generations_csv(&result.generations)?,
    )?;
    let best = serde_json::to_string_pretty(&result.best.params.to_raw())
        .context("failed to serialize best parameter set")?;
    std::fs::write(run_dir.join("best_parameter_set.json"), best)?;
    Ok(run_dir)
}

pub fn load_simulation_artifacts(dir: &Path) -> Result<TradeSimReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_report_json(&json)
}

// ─── Markdown ───────────────────────────────────────────────────────

pub fn generate_summary(report: &TradeSimReport) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str(&format!("# Trade Simulation: {}\n\n", report.ticker));
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    if let (Some(first), Some(last)) = (report.dates.first(), report.dates.last()) {
        md.push_str(&format!("| Period | {first} to {last} |\n"));
    }
    md.push_str(&format!("| Steps | {} |\n", report.len()));
    md.push_str(&format!("| Slices | {} |\n", report.slices.len()));
    md.push_str(&format!("| Initial Net Worth | {:.2} |\n", report.initial_net_worth));
    md.push_str(&format!("| Final Net Worth | {:.2} |\n", report.final_net_worth));
    md.push_str(&format!("| Profit | {:.2}% |\n", report.profit_pct));
    if let Some(bh) = report.buy_and_hold.last() {
        md.push_str(&format!("| Buy & Hold | {bh:.2} |\n"));
    }
    if let Some(ml) = report.metalabel_net_worth.as_ref().and_then(|s| s.last()) {
        md.push_str(&format!("| Metalabel Account | {ml:.2} |\n"));
    }
    md.push_str(&format!(
        "| Trades | {} buys, {} sells, {} stop-losses |\n",
        report.buy_count, report.sell_count, report.stop_loss_count
    ));
    if let Some(c) = &report.confusion {
        md.push_str(&format!(
            "| Accuracy | {:.1}% overall, {:.1}% buy/sell |\n",
            c.overall_accuracy() * 100.0,
            c.bs_accuracy() * 100.0
        ));
    }
    md.push('\n');

    if !report.slices.is_empty() {
        md.push_str("## Slices\n\n");
        md.push_str("| # | Steps | Profit |\n");
        md.push_str("| --- | --- | --- |\n");
        for s in &report.slices {
            md.push_str(&format!(
                "| {} | {}..{} | {:.2}% |\n",
                s.index, s.start, s.end, s.profit_pct
            ));
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradeSimConfig;
    use crate::test_support::{rising_bars, sma_set};
    use crate::trade_sim::run_trade_simulation;
    use evotrade_core::domain::PriceWindow;
    use evotrade_core::settings::{ModelSettings, TradebotSettings};

    fn report() -> TradeSimReport {
        let window = PriceWindow::new("RISE", rising_bars(30)).unwrap();
        let sim = TradeSimConfig {
            slice_size: 15,
            ..TradeSimConfig::default()
        };
        run_trade_simulation(
            &window,
            &sma_set(2, 5, true),
            &ModelSettings::default(),
            &TradebotSettings::default(),
            &sim,
            None,
        )
        .unwrap()
    }

    #[test]
    fn steps_csv_has_a_row_per_step() {
        let csv = export_steps_csv(&report()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 31);
        assert!(lines[0].starts_with("step,date,price,net_worth"));
        assert!(lines[5].ends_with(",buy"));
    }

    #[test]
    fn json_round_trip() {
        let r = report();
        let json = export_report_json(&r).unwrap();
        let back = import_report_json(&json).unwrap();
        assert_eq!(back.ticker, r.ticker);
        assert_eq!(back.decisions, r.decisions);
        assert_eq!(back.len(), r.len());
    }

    #[test]
    fn artifacts_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let r = report();
        let run_dir = save_simulation_artifacts(&r, dir.path()).unwrap();
        for file in ["report.json", "steps.csv", "slices.csv", "summary.md"] {
            assert!(run_dir.join(file).exists(), "{file} missing");
        }
        let loaded = load_simulation_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.slices.len(), 2);
    }

    #[test]
    fn summary_mentions_the_ticker_and_slices() {
        let md = generate_summary(&report());
        assert!(md.contains("# Trade Simulation: RISE"));
        assert!(md.contains("## Slices"));
    }
}
