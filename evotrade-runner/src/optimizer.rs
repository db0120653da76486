//! Optimizer — the generation loop around [`crate::evolution`].
//!
//! Each generation evaluates the population on the current data slice, records
//! its stats, keeps the best individual seen so far, then breeds the next
//! population with throttled parent and immigrant counts and shifts the slice.

use serde::{Deserialize, Serialize};
use tracing::info;

use evotrade_core::domain::{PriceWindow, TradeDecision};
use evotrade_core::error::ConfigError;
use evotrade_core::rng::RngHierarchy;
use evotrade_core::throttle::throttle_count;

use crate::config::RunConfig;
use crate::data_slice::DataSlice;
use crate::evolution::{
    build_pool, check_metalabels, evaluate_population, initial_population, next_population,
    select_parents, EvolutionError, Individual, Reproduction,
};
use crate::fitness::EvalContext;

/// Summary of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    /// Parents kept for the next generation.
    pub nb_parents: usize,
    /// Immigrants injected into the next generation.
    pub nb_random: usize,
    pub slice_start: usize,
    pub slice_end: usize,
    /// Individuals that could not be evaluated.
    pub config_errors: usize,
}

/// Outcome of a full optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerResult {
    pub ticker: String,
    /// Best individual over all generations, with its evaluation.
    pub best: Individual,
    pub best_generation: usize,
    pub generations: Vec<GenerationStats>,
    /// Population as evaluated in the last generation.
    pub final_population: Vec<Individual>,
}

/// Run `config.evolution.generations` generations over `window`.
///
/// `metalabels`, when given, must hold one label per bar of the window; each
/// generation scores against the labels of its own slice.
pub fn run_optimizer(
    config: &RunConfig,
    window: &PriceWindow,
    metalabels: Option<&[TradeDecision]>,
) -> Result<OptimizerResult, EvolutionError> {
    config.validate()?;
    check_metalabels(metalabels, window.len())?;

    let evo = &config.evolution;
    let rngs = RngHierarchy::new(config.master_seed);
    let pool = build_pool(evo.workers)?;
    let mut slice = DataSlice::new(&config.data_slice, window.len());
    let mut population = initial_population(evo.population_size, &config.ranges, &rngs);
    let mut best: Option<(usize, Individual)> = None;
    let mut generations = Vec::with_capacity(evo.generations);

    info!(
        ticker = window.ticker(),
        population = evo.population_size,
        generations = evo.generations,
        workers = evo.workers,
        fitness = ?evo.fitness,
        "optimizer started"
    );

    for g in 0..evo.generations {
        let bars = window.slice(slice.start(), slice.len())?;
        let ctx = EvalContext {
            model: &config.model,
            tradebot: &config.tradebot,
            mode: evo.fitness,
            metalabels: metalabels.map(|labels| &labels[slice.range()]),
        };
        evaluate_population(&mut population, bars, &ctx, pool.as_ref())?;

        let fitness: Vec<f64> = population.iter().map(Individual::fitness).collect();
        let best_fitness = fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean_fitness = fitness.iter().sum::<f64>() / fitness.len() as f64;
        let config_errors = population
            .iter()
            .filter(|ind| ind.evaluation.as_ref().is_some_and(|e| !e.is_valid()))
            .count();

        // First individual reaching the generation best.
        if let Some(leader) = population.iter().find(|ind| ind.fitness() == best_fitness) {
            let improved = best
                .as_ref()
                .map_or(true, |(_, current)| best_fitness > current.fitness());
            if improved {
                best = Some((g, leader.clone()));
            }
        }

        let nb_parents = throttle_count(g, evo.generations, evo.max_parents, evo.min_parents, evo.parents_decay);
        let nb_random = throttle_count(g, evo.generations, evo.max_random, evo.min_random, evo.random_decay);

        info!(
            generation = g,
            best = best_fitness,
            mean = mean_fitness,
            nb_parents,
            nb_random,
            slice_start = slice.start(),
            slice_end = slice.end(),
            config_errors,
            "generation evaluated"
        );
        generations.push(GenerationStats {
            generation: g,
            best_fitness,
            mean_fitness,
            nb_parents,
            nb_random,
            slice_start: slice.start(),
            slice_end: slice.end(),
            config_errors,
        });

        if g + 1 < evo.generations {
            let parents = select_parents(&population, nb_parents);
            let plan = Reproduction {
                population_size: evo.population_size,
                nb_random,
                mutation_rate: evo.mutation_rate,
            };
            population = next_population(&parents, plan, g, &config.ranges, &rngs);
            slice.advance();
        }
    }

    let (best_generation, best) = best.ok_or_else(|| {
        ConfigError::invalid("evolution.generations", "no generation was evaluated")
    })?;
    info!(
        ticker = window.ticker(),
        best_generation,
        best_fitness = best.fitness(),
        "optimizer finished"
    );

    Ok(OptimizerResult {
        ticker: window.ticker().to_string(),
        best,
        best_generation,
        generations,
        final_population: population,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{PriceSource, SyntheticPriceSource};

    fn small_config() -> RunConfig {
        let mut config = RunConfig::default();
        config.evolution.population_size = 8;
        config.evolution.generations = 4;
        config.evolution.max_parents = 3;
        config.evolution.min_parents = 1;
        config.evolution.max_random = 2;
        config.evolution.min_random = 1;
        config.data_slice.slice_size = 80;
        config.data_slice.shift_per_generation = 20;
        config
    }

    fn window() -> PriceWindow {
        let start = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        SyntheticPriceSource::new(start, 150).fetch("TEST").unwrap()
    }

    #[test]
    fn records_one_stats_entry_per_generation() {
        let config = small_config();
        let result = run_optimizer(&config, &window(), None).unwrap();
        assert_eq!(result.generations.len(), 4);
        assert_eq!(result.final_population.len(), 8);
        let slices: Vec<(usize, usize)> = result
            .generations
            .iter()
            .map(|s| (s.slice_start, s.slice_end))
            .collect();
        assert_eq!(slices, vec![(0, 80), (20, 100), (40, 120), (60, 140)]);
        for stats in &result.generations {
            assert!(stats.best_fitness >= stats.mean_fitness);
            assert!(stats.nb_parents >= 1 && stats.nb_parents <= 3);
        }
    }

    #[test]
    fn best_is_the_global_maximum() {
        let config = small_config();
        let result = run_optimizer(&config, &window(), None).unwrap();
        let max = result
            .generations
            .iter()
            .map(|s| s.best_fitness)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.best.fitness(), max);
        assert_eq!(result.generations[result.best_generation].best_fitness, max);
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let mut config = small_config();
        config.evolution.max_parents = 10;
        assert!(matches!(
            run_optimizer(&config, &window(), None),
            Err(EvolutionError::Config(_))
        ));
    }

    #[test]
    fn metalabels_must_match_the_window() {
        let config = small_config();
        let labels = vec![TradeDecision::Hold; 10];
        assert!(matches!(
            run_optimizer(&config, &window(), Some(&labels)),
            Err(EvolutionError::MetalabelLength { .. })
        ));
    }
}
