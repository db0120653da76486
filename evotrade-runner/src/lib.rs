//! EvoTrade Runner — optimizer, trade simulation, persistence, reporting.
//!
//! This crate builds on `evotrade-core` to provide:
//! - TOML run configuration shared read-only by every component
//! - Fitness evaluation (net-worth growth or metalabel accuracy)
//! - Evolutionary optimizer over sliding data slices, on a rayon worker pool
//! - Multi-slice trade simulation with carried-over accounts
//! - Price sources (CSV, synthetic) and the JSON parameter-set store
//! - Batch simulation across tickers and artifact export

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod data_slice;
pub mod evolution;
pub mod export;
pub mod fitness;
pub mod optimizer;
pub mod store;
pub mod trade_sim;

pub use batch::{run_batch, BatchError, BatchReport, FailedTicker};
pub use config::{
    DataSliceConfig, EvolutionConfig, PathsConfig, RunConfig, RunConfigError, Schedule,
    TradeSimConfig,
};
pub use data_loader::{
    load_metalabels, CsvPriceSource, DataError, PriceSource, SyntheticPriceSource,
};
pub use data_slice::{subslices, DataSlice};
pub use evolution::{DegenerateFitness, EvolutionError, Individual};
pub use fitness::{ConfusionMatrix, EvalContext, Evaluation, FitnessMode, WORST_FITNESS};
pub use optimizer::{run_optimizer, GenerationStats, OptimizerResult};
pub use store::{load_parameter_sets, JsonParameterStore, LoadedSets, ParameterStore, StoreError};
pub use trade_sim::{run_trade_simulation, SliceReport, TradeSimError, TradeSimReport};


#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn worker_pool_inputs_are_send_sync() {
        assert_send::<Individual>();
        assert_sync::<Individual>();
        assert_send::<Evaluation>();
        assert_sync::<RunConfig>();
        assert_sync::<EvalContext<'static>>();
    }

    #[test]
    fn sources_and_stores_are_send_sync() {
        assert_send::<CsvPriceSource>();
        assert_sync::<SyntheticPriceSource>();
        assert_send::<JsonParameterStore>();
        assert_sync::<Box<dyn PriceSource>>();
        assert_sync::<Box<dyn ParameterStore>>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<OptimizerResult>();
        assert_send::<TradeSimReport>();
        assert_send::<BatchReport>();
        assert_sync::<ConfusionMatrix>();
    }
}
