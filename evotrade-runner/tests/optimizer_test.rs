//! Optimizer determinism and failure isolation.

use chrono::NaiveDate;

use evotrade_core::domain::{Bar, PriceWindow};
use evotrade_core::indicators::{IndicatorConfig, IndicatorKind};
use evotrade_core::params::{AmplifierParams, IndicatorInstance, ParameterSet};
use evotrade_core::rng::RngHierarchy;
use evotrade_core::settings::{ModelSettings, TradebotSettings};
use evotrade_core::spline::SplineProperties;
use evotrade_core::threshold::ThresholdParams;
use evotrade_core::throttle::DecayMode;
use evotrade_runner::evolution::{evaluate_population, initial_population, select_parents};
use evotrade_runner::{
    run_optimizer, EvalContext, FitnessMode, Individual, PriceSource, RunConfig,
    SyntheticPriceSource, WORST_FITNESS,
};

fn window(len: usize) -> PriceWindow {
    let start = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
    SyntheticPriceSource::new(start, len).fetch("DET").unwrap()
}

fn config(workers: usize, seed: u64) -> RunConfig {
    let mut config = RunConfig {
        master_seed: seed,
        ..RunConfig::default()
    };
    config.evolution.population_size = 10;
    config.evolution.generations = 5;
    config.evolution.max_parents = 4;
    config.evolution.min_parents = 2;
    config.evolution.parents_decay = DecayMode::Linear;
    config.evolution.max_random = 3;
    config.evolution.min_random = 1;
    config.evolution.random_decay = DecayMode::Linear;
    config.evolution.workers = workers;
    config.data_slice.slice_size = 120;
    config.data_slice.shift_per_generation = 15;
    config
}

#[test]
fn same_seed_same_result() {
    let w = window(200);
    let a = run_optimizer(&config(1, 42), &w, None).unwrap();
    let b = run_optimizer(&config(1, 42), &w, None).unwrap();
    assert_eq!(a, b);
}

#[test]
fn worker_count_does_not_change_the_result() {
    let w = window(200);
    let sequential = run_optimizer(&config(1, 7), &w, None).unwrap();
    let parallel = run_optimizer(&config(4, 7), &w, None).unwrap();
    assert_eq!(sequential.best, parallel.best);
    assert_eq!(sequential.generations, parallel.generations);
    assert_eq!(sequential.final_population, parallel.final_population);
}

#[test]
fn different_seeds_explore_differently() {
    let w = window(200);
    let a = run_optimizer(&config(1, 1), &w, None).unwrap();
    let b = run_optimizer(&config(1, 2), &w, None).unwrap();
    assert_ne!(a.final_population, b.final_population);
}

#[test]
fn parent_and_immigrant_counts_decay() {
    let w = window(200);
    let result = run_optimizer(&config(1, 3), &w, None).unwrap();
    let parents: Vec<usize> = result.generations.iter().map(|g| g.nb_parents).collect();
    let randoms: Vec<usize> = result.generations.iter().map(|g| g.nb_random).collect();
    assert_eq!(parents[0], 4);
    assert_eq!(randoms[0], 3);
    assert!(parents.windows(2).all(|p| p[1] <= p[0]));
    assert!(randoms.windows(2).all(|r| r[1] <= r[0]));
    assert!(parents.iter().all(|&p| p >= 2));
    assert!(randoms.iter().all(|&r| r >= 1));
}

fn sma(fast: usize, slow: usize) -> ParameterSet {
    let mut indicators = std::collections::BTreeMap::new();
    indicators.insert(
        IndicatorKind::Sma,
        vec![IndicatorInstance {
            config: IndicatorConfig::Sma { fast, slow },
            spline: SplineProperties {
                smoothing_factor: 0.0,
                weight: 1.0,
                flip: true,
            },
        }],
    );
    ParameterSet {
        indicators,
        amplifiers: AmplifierParams::default(),
        threshold: ThresholdParams::default(),
    }
}

fn rising(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            Bar {
                date: base + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[test]
fn invalid_individual_gets_worst_fitness_without_failing_the_generation() {
    let bars = rising(50);
    let model = ModelSettings::default();
    let tradebot = TradebotSettings::default();
    let ctx = EvalContext {
        model: &model,
        tradebot: &tradebot,
        mode: FitnessMode::NetWorth,
        metalabels: None,
    };
    let mut population = vec![
        Individual::new(sma(2, 5)),
        Individual::new(sma(8, 3)),
        Individual::new(sma(3, 9)),
    ];
    evaluate_population(&mut population, &bars, &ctx, None).unwrap();

    assert!(population[0].fitness() > 1.0);
    assert_eq!(population[1].fitness(), WORST_FITNESS);
    assert!(population[1].evaluation.as_ref().unwrap().config_error.is_some());
    assert!(population[2].fitness() > 0.0);

    let parents = select_parents(&population, 2);
    assert!(parents.iter().all(|p| p.fitness() > WORST_FITNESS));
}

#[test]
fn parallel_evaluation_keeps_population_order() {
    let bars = window(150).bars().to_vec();
    let model = ModelSettings::default();
    let tradebot = TradebotSettings::default();
    let ctx = EvalContext {
        model: &model,
        tradebot: &tradebot,
        mode: FitnessMode::NetWorth,
        metalabels: None,
    };
    let config = RunConfig::default();
    let population = initial_population(16, &config.ranges, &RngHierarchy::new(5));

    let mut sequential = population.clone();
    evaluate_population(&mut sequential, &bars, &ctx, None).unwrap();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let mut parallel = population;
    evaluate_population(&mut parallel, &bars, &ctx, Some(&pool)).unwrap();

    assert_eq!(sequential, parallel);
}
