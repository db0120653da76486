//! EvoTrade Core — signal pipeline, parameter sets, and trade simulation.
//!
//! This crate holds everything needed to turn one parameter set and one
//! window of prices into a decision stream and a simulated account:
//! - Domain types (bars, price windows, decisions)
//! - Bullish/bearish indicators and the volume/volatility amplifiers
//! - Spline normalization, weighted fusion, thresholds
//! - Parameter sets, their raw persisted form, and random sampling/mutation
//! - The tradebot and its account bookkeeping
//!
//! The optimizer and batch simulation live in `evotrade-runner`.

pub mod domain;
pub mod error;
pub mod fusion;
pub mod indicators;
pub mod params;
pub mod pipeline;
pub mod rng;
pub mod settings;
pub mod simulator;
pub mod spline;
pub mod threshold;
pub mod throttle;

pub use error::{AccountSnapshot, ConfigError, SimulationError};
pub use pipeline::{build_signal, SignalModel};
