//! EvoTrade CLI — optimize, simulate and batch commands.
//!
//! Commands:
//! - `optimize` — evolve a parameter set per ticker and store the best one
//! - `simulate` — replay a stored parameter set over one ticker, slice by slice
//! - `batch` — replay the stored sets of every configured ticker
//!
//! Every command reads one TOML run file (`--config`). Logging goes through
//! `tracing`; set `RUST_LOG` to change the level.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use evotrade_core::domain::TradeDecision;
use evotrade_runner::export::{
    export_batch_csv, save_optimizer_artifacts, save_simulation_artifacts,
};
use evotrade_runner::{
    load_metalabels, run_batch, run_optimizer, run_trade_simulation, CsvPriceSource,
    JsonParameterStore, OptimizerResult, ParameterStore, PriceSource, RunConfig,
    SyntheticPriceSource, TradeSimReport,
};

#[derive(Parser)]
#[command(
    name = "evotrade",
    about = "EvoTrade CLI — evolutionary signal-fusion optimizer and trade simulator"
)]
struct Cli {
    /// Path to the TOML run file.
    #[arg(long, global = true, default_value = "evotrade.toml")]
    config: PathBuf,

    /// Use synthetic prices even when a price directory is configured.
    #[arg(long, global = true, default_value_t = false)]
    synthetic: bool,

    /// First date of synthetic price series (YYYY-MM-DD).
    #[arg(long, global = true, default_value = "2020-01-02")]
    synthetic_start: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve a parameter set for each ticker and store the best one.
    Optimize {
        /// Only this ticker (defaults to every ticker in the run file).
        #[arg(long)]
        ticker: Option<String>,

        /// Do not write the best set to the parameter store.
        #[arg(long, default_value_t = false)]
        no_store: bool,
    },
    /// Replay the stored parameter set of one ticker.
    Simulate {
        #[arg(long)]
        ticker: String,
    },
    /// Replay the stored parameter sets of every configured ticker.
    Batch,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = RunConfig::load(&cli.config)
        .with_context(|| format!("failed to load run file {}", cli.config.display()))?;
    let source = price_source(&config, cli.synthetic, &cli.synthetic_start)?;
    let store = JsonParameterStore::new(&config.paths.store_dir, &config.paths.term);

    match cli.command {
        Commands::Optimize { ticker, no_store } => {
            run_optimize_cmd(&config, source.as_ref(), &store, ticker, no_store)
        }
        Commands::Simulate { ticker } => run_simulate_cmd(&config, source.as_ref(), &store, &ticker),
        Commands::Batch => run_batch_cmd(&config, source.as_ref(), &store),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();
}

fn price_source(
    config: &RunConfig,
    force_synthetic: bool,
    synthetic_start: &str,
) -> Result<Box<dyn PriceSource>> {
    match (&config.paths.price_dir, force_synthetic) {
        (Some(dir), false) => Ok(Box::new(CsvPriceSource::new(dir))),
        _ => {
            let start = NaiveDate::parse_from_str(synthetic_start, "%Y-%m-%d")
                .with_context(|| format!("bad --synthetic-start '{synthetic_start}'"))?;
            warn!(start = %start, bars = config.synthetic_len, "using synthetic prices");
            Ok(Box::new(SyntheticPriceSource::new(start, config.synthetic_len)))
        }
    }
}

fn metalabels(config: &RunConfig) -> Result<Option<Vec<TradeDecision>>> {
    config
        .paths
        .metalabels
        .as_deref()
        .map(|path| {
            load_metalabels(path)
                .with_context(|| format!("failed to load metalabels {}", path.display()))
        })
        .transpose()
}

fn run_optimize_cmd(
    config: &RunConfig,
    source: &dyn PriceSource,
    store: &JsonParameterStore,
    ticker: Option<String>,
    no_store: bool,
) -> Result<()> {
    let tickers = match ticker {
        Some(t) => vec![t],
        None => config.tickers.clone(),
    };
    if tickers.is_empty() {
        bail!("no tickers to optimize: pass --ticker or list them in the run file");
    }
    let labels = metalabels(config)?;
    if labels.is_some() && tickers.len() > 1 {
        bail!("metalabels belong to a single ticker; pass --ticker");
    }

    for ticker in &tickers {
        let window = source
            .fetch(ticker)
            .with_context(|| format!("no price data for {ticker}"))?;
        let result = run_optimizer(config, &window, labels.as_deref())
            .with_context(|| format!("optimizer failed for {ticker}"))?;
        print_optimizer_summary(&result);

        if !no_store {
            let path = store.save(ticker, &config.run_id, &result.best.params)?;
            info!(ticker = %ticker, path = %path.display(), "best parameter set stored");
        }
        let run_dir = save_optimizer_artifacts(&result, &config.paths.output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_simulate_cmd(
    config: &RunConfig,
    source: &dyn PriceSource,
    store: &JsonParameterStore,
    ticker: &str,
) -> Result<()> {
    let Some(params) = store.load(ticker, &config.run_id)? else {
        bail!(
            "no parameter set for {ticker} (run {}) under {}",
            config.run_id,
            config.paths.store_dir.display()
        );
    };
    let window = source
        .fetch(ticker)
        .with_context(|| format!("no price data for {ticker}"))?;
    let labels = metalabels(config)?;
    let report = run_trade_simulation(
        &window,
        &params,
        &config.model,
        &config.tradebot,
        &config.trade_sim,
        labels.as_deref(),
    )?;
    print_simulation_summary(&report);

    let run_dir = save_simulation_artifacts(&report, &config.paths.output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_batch_cmd(config: &RunConfig, source: &dyn PriceSource, store: &JsonParameterStore) -> Result<()> {
    let batch = run_batch(config, source, store)?;
    for report in &batch.reports {
        print_simulation_summary(report);
    }
    for failed in &batch.failed {
        println!("  {:<8} failed: {}", failed.ticker, failed.reason);
    }
    println!(
        "Batch: {} simulated, {} skipped, {} failed, mean profit {:.2}%",
        batch.reports.len(),
        batch.skipped.len(),
        batch.failed.len(),
        batch.mean_profit_pct()
    );

    let path = write_batch_csv(&export_batch_csv(&batch)?, &config.paths.output_dir, &config.run_id)?;
    println!("Batch summary saved to: {}", path.display());
    Ok(())
}

fn write_batch_csv(csv: &str, output_dir: &Path, run_id: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join(format!("batch_run_{run_id}.csv"));
    std::fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn print_optimizer_summary(result: &OptimizerResult) {
    println!();
    println!("=== Optimizer: {} ===", result.ticker);
    println!("  Generations:     {}", result.generations.len());
    println!(
        "  Best fitness:    {:.4} (generation {})",
        result.best.fitness(),
        result.best_generation
    );
    if let Some(eval) = &result.best.evaluation {
        println!(
            "  Net worth:       {:.2} -> {:.2}",
            eval.initial_net_worth, eval.final_net_worth
        );
        println!(
            "  Trades:          {} buys, {} sells, {} stop-losses",
            eval.buy_count, eval.sell_count, eval.stop_loss_count
        );
    }
    println!("  Indicators:      {}", result.best.params.indicator_count());
    println!();
}

fn print_simulation_summary(report: &TradeSimReport) {
    println!();
    println!("=== Simulation: {} ===", report.ticker);
    println!("  Steps:           {} in {} slices", report.len(), report.slices.len());
    println!("  Initial:         {:.2}", report.initial_net_worth);
    println!("  Final:           {:.2}", report.final_net_worth);
    println!("  Profit:          {:.2}%", report.profit_pct);
    if let Some(bh) = report.buy_and_hold.last() {
        println!("  Buy & hold:      {bh:.2}");
    }
    println!(
        "  Trades:          {} buys, {} sells, {} stop-losses",
        report.buy_count, report.sell_count, report.stop_loss_count
    );
    if let Some(c) = &report.confusion {
        println!("  B/S accuracy:    {:.1}%", c.bs_accuracy() * 100.0);
    }
    println!();
}
