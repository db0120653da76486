//! Price data and metalabel loading for the runner.
//!
//! The pipeline never fetches data itself: every window is resolved through a
//! [`PriceSource`] before evaluation starts. Two sources ship with the crate:
//! 1. [`CsvPriceSource`] reads `<root>/<TICKER>.csv`
//!    (header `date,open,high,low,close,volume`);
//! 2. [`SyntheticPriceSource`] generates a seeded random walk per ticker.
//!
//! Synthetic data is a developer-only mode for runs without downloaded prices.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use evotrade_core::domain::{Bar, PriceWindow, TradeDecision, WindowError};
use evotrade_core::rng::seed_from_label;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("no price data for '{0}'")]
    TickerNotFound(String),

    #[error("bad price window for '{ticker}': {source}")]
    Window {
        ticker: String,
        #[source]
        source: WindowError,
    },
}

/// Where price windows come from.
pub trait PriceSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Contiguous, chronologically ordered bars for `ticker`.
    fn fetch(&self, ticker: &str) -> Result<PriceWindow, DataError>;
}

fn window(ticker: &str, bars: Vec<Bar>) -> Result<PriceWindow, DataError> {
    PriceWindow::new(ticker, bars).map_err(|source| DataError::Window {
        ticker: ticker.to_string(),
        source,
    })
}

fn open(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ─── CSV ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<CsvBar> for Bar {
    fn from(row: CsvBar) -> Self {
        Bar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// One CSV file per ticker under a root directory.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    root: PathBuf,
}

impl CsvPriceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.root.join(format!("{}.csv", ticker.to_uppercase()))
    }
}

impl PriceSource for CsvPriceSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, ticker: &str) -> Result<PriceWindow, DataError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(DataError::TickerNotFound(ticker.to_string()));
        }
        let mut reader = csv::Reader::from_reader(open(&path)?);
        let bars = reader
            .deserialize::<CsvBar>()
            .map(|row| row.map(Bar::from))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(ticker, bars = bars.len(), path = %path.display(), "loaded price csv");
        window(ticker, bars)
    }
}

// ─── Synthetic ───────────────────────────────────────────────────────

/// Seeded random walk on weekdays. Same ticker, same bars.
#[derive(Debug, Clone)]
pub struct SyntheticPriceSource {
    start: NaiveDate,
    len: usize,
}

impl SyntheticPriceSource {
    pub fn new(start: NaiveDate, len: usize) -> Self {
        Self { start, len }
    }
}

impl PriceSource for SyntheticPriceSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, ticker: &str) -> Result<PriceWindow, DataError> {
        window(ticker, generate_synthetic_bars(ticker, self.start, self.len))
    }
}

fn generate_synthetic_bars(ticker: &str, start: NaiveDate, len: usize) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed_from_label(ticker));
    let mut bars = Vec::with_capacity(len);
    let mut price = 100.0_f64;
    let mut current = start;

    while bars.len() < len {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0);

        bars.push(Bar {
            date: current,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}

// ─── Metalabels ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LabelRow {
    label: TradeDecision,
}

/// Ground-truth decisions from a CSV with a `label` column (`buy`, `sell`, `hold`).
///
/// Other columns (a date, for instance) are ignored.
pub fn load_metalabels(path: &Path) -> Result<Vec<TradeDecision>, DataError> {
    let mut reader = csv::Reader::from_reader(open(path)?);
    let labels = reader
        .deserialize::<LabelRow>()
        .map(|row| row.map(|r| r.label))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(labels = labels.len(), path = %path.display(), "loaded metalabels");
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn synthetic_is_deterministic_and_skips_weekends() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let source = SyntheticPriceSource::new(start, 30);
        let a = source.fetch("SPY").unwrap();
        let b = source.fetch("SPY").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
        assert!(a.bars().iter().all(|bar| bar.date.weekday().number_from_monday() <= 5));
        assert!(a.bars().iter().all(|bar| bar.high >= bar.low));
        assert_ne!(a.closes(), source.fetch("QQQ").unwrap().closes());
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("ABC.csv")).unwrap();
        writeln!(file, "date,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-02,10,11,9,10.5,1000").unwrap();
        writeln!(file, "2024-01-03,10.5,12,10,11.5,1500").unwrap();
        drop(file);

        let source = CsvPriceSource::new(dir.path());
        let window = source.fetch("abc").unwrap();
        assert_eq!(window.ticker(), "abc");
        assert_eq!(window.closes(), vec![10.5, 11.5]);
        assert_eq!(window.bars()[1].volume, 1500.0);
    }

    #[test]
    fn missing_ticker_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvPriceSource::new(dir.path());
        assert!(matches!(
            source.fetch("NOPE"),
            Err(DataError::TickerNotFound(t)) if t == "NOPE"
        ));
    }

    #[test]
    fn out_of_order_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join("XYZ.csv")).unwrap();
        writeln!(file, "date,open,high,low,close,volume").unwrap();
        writeln!(file, "2024-01-03,1,1,1,1,1").unwrap();
        writeln!(file, "2024-01-02,1,1,1,1,1").unwrap();
        drop(file);

        let source = CsvPriceSource::new(dir.path());
        assert!(matches!(source.fetch("XYZ"), Err(DataError::Window { .. })));
    }

    #[test]
    fn metalabels_parse_snake_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "date,label").unwrap();
        writeln!(file, "2024-01-02,hold").unwrap();
        writeln!(file, "2024-01-03,buy").unwrap();
        writeln!(file, "2024-01-04,sell").unwrap();
        drop(file);

        let labels = load_metalabels(&path).unwrap();
        assert_eq!(
            labels,
            vec![TradeDecision::Hold, TradeDecision::Buy, TradeDecision::Sell]
        );
    }
}
