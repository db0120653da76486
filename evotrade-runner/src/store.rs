//! Parameter-set persistence.
//!
//! Sets are stored in their raw nested-map form as pretty JSON under
//! `<root>/<term>/run_<run_id>_<ticker>.json`. A missing file is not an
//! error: [`ParameterStore::load`] returns `Ok(None)` and batch callers skip
//! the ticker.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use evotrade_core::error::ConfigError;
use evotrade_core::params::{ParameterSet, RawParameterSet};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed parameter set '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("incomplete parameter set '{path}': {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// Keyed storage of parameter sets by `(ticker, run_id)`.
pub trait ParameterStore: Send + Sync {
    fn load(&self, ticker: &str, run_id: &str) -> Result<Option<ParameterSet>, StoreError>;

    fn save(&self, ticker: &str, run_id: &str, set: &ParameterSet) -> Result<PathBuf, StoreError>;
}

/// JSON files grouped by investment term.
#[derive(Debug, Clone)]
pub struct JsonParameterStore {
    root: PathBuf,
    term: String,
}

impl JsonParameterStore {
    pub fn new(root: impl Into<PathBuf>, term: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            term: term.into(),
        }
    }

    pub fn path_for(&self, ticker: &str, run_id: &str) -> PathBuf {
        self.root
            .join(&self.term)
            .join(format!("run_{run_id}_{ticker}.json"))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ParameterStore for JsonParameterStore {
    fn load(&self, ticker: &str, run_id: &str) -> Result<Option<ParameterSet>, StoreError> {
        let path = self.path_for(ticker, run_id);
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        let raw: RawParameterSet =
            serde_json::from_str(&json).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
        let set = ParameterSet::try_from(raw).map_err(|source| StoreError::Invalid {
            path: path.clone(),
            source,
        })?;
        debug!(ticker, run_id, indicators = set.indicator_count(), "parameter set loaded");
        Ok(Some(set))
    }

    fn save(&self, ticker: &str, run_id: &str, set: &ParameterSet) -> Result<PathBuf, StoreError> {
        let path = self.path_for(ticker, run_id);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        let json = serde_json::to_string_pretty(&set.to_raw()).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|e| io_error(&path, e))?;
        debug!(ticker, run_id, path = %path.display(), "parameter set saved");
        Ok(path)
    }
}

/// Parameter sets found for a list of tickers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedSets {
    /// Tickers that have a usable set, in request order.
    pub tickers: Vec<String>,
    /// One set per entry of `tickers`.
    pub sets: Vec<ParameterSet>,
    /// Tickers without a stored set, or with one that failed validation.
    pub skipped: Vec<String>,
}

impl LoadedSets {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Load one set per ticker, skipping tickers with no usable set.
///
/// Missing files and incomplete sets are skipped with a warning; I/O and
/// JSON failures are returned.
pub fn load_parameter_sets(
    store: &dyn ParameterStore,
    tickers: &[String],
    run_id: &str,
) -> Result<LoadedSets, StoreError> {
    let mut loaded = LoadedSets::default();
    for ticker in tickers {
        match store.load(ticker, run_id) {
            Ok(Some(set)) => {
                loaded.tickers.push(ticker.clone());
                loaded.sets.push(set);
            }
            Ok(None) => {
                warn!(ticker = %ticker, run_id, "no parameter set stored, skipping ticker");
                loaded.skipped.push(ticker.clone());
            }
            Err(StoreError::Invalid { path, source }) => {
                warn!(ticker = %ticker, path = %path.display(), error = %source, "unusable parameter set, skipping ticker");
                loaded.skipped.push(ticker.clone());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(loaded)
}
