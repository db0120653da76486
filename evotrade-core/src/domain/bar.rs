//! Bar and PriceWindow — the market data the pipeline reads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV sample for one time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Midpoint of the open and close prices.
    pub fn oc_mid(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    /// Typical price: (high + low + close) / 3.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, positive prices.
    pub fn is_sane(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("price window for '{0}' is empty")]
    Empty(String),

    #[error("bars out of order at index {index}: {prev} is not before {next}")]
    OutOfOrder {
        index: usize,
        prev: NaiveDate,
        next: NaiveDate,
    },

    #[error("slice [{start}, {start}+{len}) exceeds window length {available}")]
    SliceOutOfRange {
        start: usize,
        len: usize,
        available: usize,
    },
}

/// Chronologically ordered, gap-free OHLCV series for one ticker.
///
/// Immutable once built. Pipeline stages borrow `&[Bar]` views of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceWindow {
    ticker: String,
    bars: Vec<Bar>,
}

impl PriceWindow {
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Result<Self, WindowError> {
        let ticker = ticker.into();
        if bars.is_empty() {
            return Err(WindowError::Empty(ticker));
        }
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(WindowError::OutOfOrder {
                    index: i + 1,
                    prev: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Borrow `len` consecutive bars starting at `start`.
    pub fn slice(&self, start: usize, len: usize) -> Result<&[Bar], WindowError> {
        let end = start.checked_add(len).filter(|&e| e <= self.bars.len());
        match end {
            Some(end) => Ok(&self.bars[start..end]),
            None => Err(WindowError::SliceOutOfRange {
                start,
                len,
                available: self.bars.len(),
            }),
        }
    }
}
