//! Evolution — evaluation, elitist selection and reproduction of a population.
//!
//! Generation step, in order:
//! 1. [`evaluate_population`] scores every individual on the generation's bars,
//!    in parallel on a rayon pool, results kept in population order;
//! 2. [`select_parents`] keeps the `nb_parents` best by fitness ratio;
//! 3. [`next_population`] carries the parents over, fills the population with
//!    mutated copies of them (round-robin) and appends `nb_random` immigrants.
//!
//! All randomness comes from the [`RngHierarchy`], keyed by generation, so the
//! outcome does not depend on the worker count.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use evotrade_core::domain::{Bar, TradeDecision, WindowError};
use evotrade_core::error::{ConfigError, SimulationError};
use evotrade_core::params::{mutate, random_parameter_set, ParameterRanges, ParameterSet};
use evotrade_core::rng::{RngHierarchy, STREAM_IMMIGRANT, STREAM_INITIAL, STREAM_OFFSPRING};

use crate::fitness::{evaluate, EvalContext, Evaluation};

/// Errors that abort an optimizer run.
#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("price window: {0}")]
    Window(#[from] WindowError),

    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{labels} metalabels supplied for a window of {bars} bars")]
    MetalabelLength { labels: usize, bars: usize },
}

/// One parameter set and its most recent evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub params: ParameterSet,
    pub evaluation: Option<Evaluation>,
}

impl Individual {
    pub fn new(params: ParameterSet) -> Self {
        Self {
            params,
            evaluation: None,
        }
    }

    /// Fitness of the last evaluation; unevaluated individuals rank last.
    pub fn fitness(&self) -> f64 {
        self.evaluation.as_ref().map_or(0.0, |e| e.fitness)
    }
}

// ─── Population setup ────────────────────────────────────────────────

/// `size` random individuals from the initial stream.
pub fn initial_population(
    size: usize,
    ranges: &ParameterRanges,
    rngs: &RngHierarchy,
) -> Vec<Individual> {
    (0..size)
        .map(|i| {
            let mut rng = rngs.rng_for(STREAM_INITIAL, 0, i as u64);
            Individual::new(random_parameter_set(ranges, &mut rng))
        })
        .collect()
}

/// Worker pool for `workers` threads; `None` means evaluate sequentially.
pub fn build_pool(workers: usize) -> Result<Option<rayon::ThreadPool>, EvolutionError> {
    if workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        Ok(Some(pool))
    } else {
        Ok(None)
    }
}

// ─── Evaluate ────────────────────────────────────────────────────────

/// Score every individual in place. Output order equals input order.
pub fn evaluate_population(
    population: &mut [Individual],
    bars: &[Bar],
    ctx: &EvalContext<'_>,
    pool: Option<&rayon::ThreadPool>,
) -> Result<(), EvolutionError> {
    let results: Result<Vec<Evaluation>, SimulationError> = match pool {
        Some(tp) => tp.install(|| {
            population
                .par_iter()
                .map(|ind| evaluate(&ind.params, bars, ctx))
                .collect()
        }),
        None => population
            .iter()
            .map(|ind| evaluate(&ind.params, bars, ctx))
            .collect(),
    };
    for (ind, evaluation) in population.iter_mut().zip(results?) {
        ind.evaluation = Some(evaluation);
    }
    Ok(())
}

/// Metalabels, when supplied, must cover every bar of the window.
pub fn check_metalabels(labels: Option<&[TradeDecision]>, bars: usize) -> Result<(), EvolutionError> {
    match labels {
        Some(l) if l.len() != bars => Err(EvolutionError::MetalabelLength {
            labels: l.len(),
            bars,
        }),
        _ => Ok(()),
    }
}

// ─── Select ──────────────────────────────────────────────────────────

/// Every individual scored zero, so ratios are undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("population fitness sums to zero")]
pub struct DegenerateFitness;

/// `fitness_i / Σ fitness` for each individual.
pub fn fitness_ratios(population: &[Individual]) -> Result<Vec<f64>, DegenerateFitness> {
    let total: f64 = population.iter().map(Individual::fitness).sum();
    if total == 0.0 || !total.is_finite() {
        return Err(DegenerateFitness);
    }
    Ok(population.iter().map(|i| i.fitness() / total).collect())
}

/// Indices of the population ordered best-first by fitness ratio.
///
/// Stable: equal scores keep population order. With a degenerate fitness sum
/// the raw fitness values are ranked instead.
pub fn rank(population: &[Individual]) -> Vec<usize> {
    let scores = match fitness_ratios(population) {
        Ok(ratios) => ratios,
        Err(e) => {
            debug!(error = %e, "ranking on raw fitness");
            population.iter().map(Individual::fitness).collect()
        }
    };
    let mut order: Vec<usize> = (0..population.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Clones of the `nb_parents` best individuals, best first.
pub fn select_parents(population: &[Individual], nb_parents: usize) -> Vec<Individual> {
    rank(population)
        .into_iter()
        .take(nb_parents)
        .map(|i| population[i].clone())
        .collect()
}

// ─── Reproduce ───────────────────────────────────────────────────────

/// Sizing and mutation rate for one reproduction step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reproduction {
    pub population_size: usize,
    pub nb_random: usize,
    pub mutation_rate: f64,
}

/// Parents, then round-robin mutated offspring, then random immigrants.
///
/// Offspring lose their evaluation; parents keep theirs until re-evaluated.
pub fn next_population(
    parents: &[Individual],
    plan: Reproduction,
    generation: usize,
    ranges: &ParameterRanges,
    rngs: &RngHierarchy,
) -> Vec<Individual> {
    let mut population = Vec::with_capacity(plan.population_size);
    population.extend_from_slice(parents);

    let nb_offspring = plan
        .population_size
        .saturating_sub(parents.len())
        .saturating_sub(plan.nb_random);
    if !parents.is_empty() {
        let mut rng = rngs.rng_for(STREAM_OFFSPRING, generation as u64, 0);
        for k in 0..nb_offspring {
            let parent = &parents[k % parents.len()];
            let mut child = parent.params.clone();
            let nb_mutations = (child.leaf_count() as f64 * plan.mutation_rate).round() as usize;
            mutate(&mut child, nb_mutations, ranges, &mut rng);
            population.push(Individual::new(child));
        }
    }

    let nb_random = plan.population_size.saturating_sub(population.len());
    for i in 0..nb_random {
        let mut rng = rngs.rng_for(STREAM_IMMIGRANT, generation as u64, i as u64);
        population.push(Individual::new(random_parameter_set(ranges, &mut rng)));
    }
    population
}
