//! Random parameter sets and leaf mutation.
//!
//! Every leaf has a range it is drawn from. Random sets pick per-kind instance
//! counts first, then draw every leaf; mutation redraws chosen leaves in place.
//! After any draw, cross-field constraints (fast < slow, rsi lower < upper,
//! threshold lower < upper) are repaired rather than rejected.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{
    AmplifierField, AmplifierParams, AmplifierProperties, IndicatorField, IndicatorInstance, Leaf,
    ParameterSet, ThresholdField,
};
use crate::error::ConfigError;
use crate::indicators::{IndicatorConfig, IndicatorKind};
use crate::spline::SplineProperties;
use crate::threshold::{ThresholdMode, ThresholdParams};

/// Inclusive range for one numeric leaf.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub fn sample_period<R: Rng>(&self, rng: &mut R) -> usize {
        (self.sample(rng).round() as usize).max(1)
    }
}

/// Ranges for every leaf kind, plus per-kind instance limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterRanges {
    /// Upper bound on instances drawn per indicator kind.
    pub max_instances_per_kind: usize,
    pub timeframe: ParamRange,
    pub ma_fast: ParamRange,
    pub ma_slow: ParamRange,
    pub rsi_upper: ParamRange,
    pub rsi_lower: ParamRange,
    pub smoothing_factor: ParamRange,
    pub weight: ParamRange,
    pub amplification: ParamRange,
    pub standard_upper: ParamRange,
    pub standard_lower: ParamRange,
    pub buffer: ParamRange,
    pub band_width: ParamRange,
    pub threshold_timeframe: ParamRange,
}

impl Default for ParameterRanges {
    fn default() -> Self {
        Self {
            max_instances_per_kind: 2,
            timeframe: ParamRange::new(5.0, 30.0),
            ma_fast: ParamRange::new(3.0, 15.0),
            ma_slow: ParamRange::new(10.0, 50.0),
            rsi_upper: ParamRange::new(60.0, 85.0),
            rsi_lower: ParamRange::new(15.0, 40.0),
            smoothing_factor: ParamRange::new(0.0, 8.0),
            weight: ParamRange::new(0.0, 1.0),
            amplification: ParamRange::new(0.0, 1.0),
            standard_upper: ParamRange::new(0.1, 0.8),
            standard_lower: ParamRange::new(-0.8, -0.1),
            buffer: ParamRange::new(0.0, 0.1),
            band_width: ParamRange::new(0.5, 2.5),
            threshold_timeframe: ParamRange::new(5.0, 30.0),
        }
    }
}

impl ParameterRanges {
    /// Every range must have finite bounds with `min <= max`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("ranges.timeframe", self.timeframe),
            ("ranges.ma_fast", self.ma_fast),
            ("ranges.ma_slow", self.ma_slow),
            ("ranges.rsi_upper", self.rsi_upper),
            ("ranges.rsi_lower", self.rsi_lower),
            ("ranges.smoothing_factor", self.smoothing_factor),
            ("ranges.weight", self.weight),
            ("ranges.amplification", self.amplification),
            ("ranges.standard_upper", self.standard_upper),
            ("ranges.standard_lower", self.standard_lower),
            ("ranges.buffer", self.buffer),
            ("ranges.band_width", self.band_width),
            ("ranges.threshold_timeframe", self.threshold_timeframe),
        ];
        for (key, r) in ranges {
            if !(r.min.is_finite() && r.max.is_finite()) {
                return Err(ConfigError::invalid(
                    key,
                    format!("bounds {}..={} must be finite", r.min, r.max),
                ));
            }
            if r.min > r.max {
                return Err(ConfigError::invalid(
                    key,
                    format!("min {} is above max {}", r.min, r.max),
                ));
            }
        }
        Ok(())
    }
}

fn random_config<R: Rng>(
    kind: IndicatorKind,
    ranges: &ParameterRanges,
    rng: &mut R,
) -> IndicatorConfig {
    match kind {
        IndicatorKind::Rsi => IndicatorConfig::Rsi {
            timeframe: ranges.timeframe.sample_period(rng),
            upper_threshold: ranges.rsi_upper.sample(rng),
            lower_threshold: ranges.rsi_lower.sample(rng),
        },
        IndicatorKind::Sma => IndicatorConfig::Sma {
            fast: ranges.ma_fast.sample_period(rng),
            slow: ranges.ma_slow.sample_period(rng),
        },
        IndicatorKind::Ema => IndicatorConfig::Ema {
            fast: ranges.ma_fast.sample_period(rng),
            slow: ranges.ma_slow.sample_period(rng),
        },
        IndicatorKind::Lwma => IndicatorConfig::Lwma {
            timeframe: ranges.timeframe.sample_period(rng),
        },
        IndicatorKind::Cci => IndicatorConfig::Cci {
            timeframe: ranges.timeframe.sample_period(rng),
        },
        IndicatorKind::Eom => IndicatorConfig::Eom {
            timeframe: ranges.timeframe.sample_period(rng),
        },
        IndicatorKind::OcGradient => IndicatorConfig::OcGradient,
    }
}

fn random_spline<R: Rng>(ranges: &ParameterRanges, rng: &mut R) -> SplineProperties {
    SplineProperties {
        smoothing_factor: ranges.smoothing_factor.sample(rng),
        weight: ranges.weight.sample(rng),
        flip: rng.gen_bool(0.5),
    }
}

fn random_amplifier<R: Rng>(ranges: &ParameterRanges, rng: &mut R) -> AmplifierProperties {
    AmplifierProperties {
        smoothing_factor: ranges.smoothing_factor.sample(rng),
        amplification: ranges.amplification.sample(rng),
    }
}

fn random_mode<R: Rng>(rng: &mut R) -> ThresholdMode {
    if rng.gen_bool(0.5) {
        ThresholdMode::Standard
    } else {
        ThresholdMode::RollingBand
    }
}

/// Draw a complete parameter set. At least one indicator instance is always present.
pub fn random_parameter_set<R: Rng>(ranges: &ParameterRanges, rng: &mut R) -> ParameterSet {
    let max_count = ranges.max_instances_per_kind.max(1);
    let mut counts: Vec<(IndicatorKind, usize)> = IndicatorKind::ALL
        .iter()
        .map(|&kind| (kind, rng.gen_range(0..=max_count)))
        .collect();
    if counts.iter().all(|&(_, c)| c == 0) {
        let pick = rng.gen_range(0..counts.len());
        counts[pick].1 = 1;
    }

    let mut indicators = BTreeMap::new();
    for (kind, count) in counts {
        if count == 0 {
            continue;
        }
        let instances = (0..count)
            .map(|_| IndicatorInstance {
                config: random_config(kind, ranges, rng),
                spline: random_spline(ranges, rng),
            })
            .collect();
        indicators.insert(kind, instances);
    }

    let mut set = ParameterSet {
        indicators,
        amplifiers: AmplifierParams {
            volume: random_amplifier(ranges, rng),
            volatility: random_amplifier(ranges, rng),
            volatility_timeframe: ranges.timeframe.sample_period(rng),
        },
        threshold: ThresholdParams {
            mode: random_mode(rng),
            standard_upper: ranges.standard_upper.sample(rng),
            standard_lower: ranges.standard_lower.sample(rng),
            buffer: ranges.buffer.sample(rng),
            band_width: ranges.band_width.sample(rng),
            timeframe: ranges.threshold_timeframe.sample_period(rng),
        },
    };
    fix_cross_field_constraints(&mut set);
    set
}

fn randomize_indicator_field<R: Rng>(
    inst: &mut IndicatorInstance,
    field: IndicatorField,
    ranges: &ParameterRanges,
    rng: &mut R,
) {
    match field {
        IndicatorField::Smoothing => inst.spline.smoothing_factor = ranges.smoothing_factor.sample(rng),
        IndicatorField::Weight => inst.spline.weight = ranges.weight.sample(rng),
        IndicatorField::Flip => inst.spline.flip = rng.gen_bool(0.5),
        IndicatorField::Timeframe => match &mut inst.config {
            IndicatorConfig::Rsi { timeframe, .. }
            | IndicatorConfig::Lwma { timeframe }
            | IndicatorConfig::Cci { timeframe }
            | IndicatorConfig::Eom { timeframe } => *timeframe = ranges.timeframe.sample_period(rng),
            _ => {}
        },
        IndicatorField::Fast => {
            if let IndicatorConfig::Sma { fast, .. } | IndicatorConfig::Ema { fast, .. } = &mut inst.config {
                *fast = ranges.ma_fast.sample_period(rng);
            }
        }
        IndicatorField::Slow => {
            if let IndicatorConfig::Sma { slow, .. } | IndicatorConfig::Ema { slow, .. } = &mut inst.config {
                *slow = ranges.ma_slow.sample_period(rng);
            }
        }
        IndicatorField::RsiUpper => {
            if let IndicatorConfig::Rsi { upper_threshold, .. } = &mut inst.config {
                *upper_threshold = ranges.rsi_upper.sample(rng);
            }
        }
        IndicatorField::RsiLower => {
            if let IndicatorConfig::Rsi { lower_threshold, .. } = &mut inst.config {
                *lower_threshold = ranges.rsi_lower.sample(rng);
            }
        }
    }
}

/// Replace one leaf with a fresh value from its range.
pub fn randomize_leaf<R: Rng>(
    set: &mut ParameterSet,
    leaf: Leaf,
    ranges: &ParameterRanges,
    rng: &mut R,
) {
    match leaf {
        Leaf::Indicator { kind, index, field } => {
            if let Some(inst) = set.instance_mut(kind, index) {
                randomize_indicator_field(inst, field, ranges, rng);
            }
        }
        Leaf::Amplifier(field) => {
            let amp = &mut set.amplifiers;
            match field {
                AmplifierField::VolumeSmoothing => {
                    amp.volume.smoothing_factor = ranges.smoothing_factor.sample(rng)
                }
                AmplifierField::VolumeAmplification => {
                    amp.volume.amplification = ranges.amplification.sample(rng)
                }
                AmplifierField::VolatilityTimeframe => {
                    amp.volatility_timeframe = ranges.timeframe.sample_period(rng)
                }
                AmplifierField::VolatilitySmoothing => {
                    amp.volatility.smoothing_factor = ranges.smoothing_factor.sample(rng)
                }
                AmplifierField::VolatilityAmplification => {
                    amp.volatility.amplification = ranges.amplification.sample(rng)
                }
            }
        }
        Leaf::Threshold(field) => {
            let th = &mut set.threshold;
            match field {
                ThresholdField::Mode => th.mode = random_mode(rng),
                ThresholdField::StandardUpper => th.standard_upper = ranges.standard_upper.sample(rng),
                ThresholdField::StandardLower => th.standard_lower = ranges.standard_lower.sample(rng),
                ThresholdField::Buffer => th.buffer = ranges.buffer.sample(rng),
                ThresholdField::BandWidth => th.band_width = ranges.band_width.sample(rng),
                ThresholdField::Timeframe => {
                    th.timeframe = ranges.threshold_timeframe.sample_period(rng)
                }
            }
        }
    }
}

/// Redraw `nb_mutations` randomly chosen leaves (with replacement).
pub fn mutate<R: Rng>(
    set: &mut ParameterSet,
    nb_mutations: usize,
    ranges: &ParameterRanges,
    rng: &mut R,
) {
    let leaves = set.leaves();
    if leaves.is_empty() {
        return;
    }
    for _ in 0..nb_mutations {
        let leaf = leaves[rng.gen_range(0..leaves.len())];
        randomize_leaf(set, leaf, ranges, rng);
    }
    fix_cross_field_constraints(set);
}

/// Repair ordering constraints the indicator constructors rely on.
///
/// - moving-average crossovers: slow must exceed fast (swap, then widen by 1)
/// - rsi: lower must sit below upper (swap, then nudge apart)
/// - fused thresholds: lower must sit below upper (swap)
pub fn fix_cross_field_constraints(set: &mut ParameterSet) {
    for list in set.indicators.values_mut() {
        for inst in list.iter_mut() {
            match &mut inst.config {
                IndicatorConfig::Sma { fast, slow } | IndicatorConfig::Ema { fast, slow } => {
                    if *slow <= *fast {
                        let (f, s) = (*fast, *slow);
                        *fast = f.min(s);
                        *slow = f.max(s) + 1;
                    }
                }
                IndicatorConfig::Rsi {
                    upper_threshold,
                    lower_threshold,
                    ..
                } => {
                    if *lower_threshold > *upper_threshold {
                        std::mem::swap(lower_threshold, upper_threshold);
                    }
                    if *lower_threshold >= *upper_threshold {
                        *lower_threshold = (*upper_threshold - 1.0).max(1.0);
                        *upper_threshold = (*lower_threshold + 1.0).min(99.0);
                    }
                }
                _ => {}
            }
        }
    }
    let th = &mut set.threshold;
    if th.standard_lower > th.standard_upper {
        std::mem::swap(&mut th.standard_lower, &mut th.standard_upper);
    }
    if th.standard_lower >= th.standard_upper {
        th.standard_lower = th.standard_upper - 0.1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::test_sets::mixed;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn same_seed_same_set() {
        let ranges = ParameterRanges::default();
        let a = random_parameter_set(&ranges, &mut StdRng::seed_from_u64(42));
        let b = random_parameter_set(&ranges, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn default_ranges_validate() {
        assert!(ParameterRanges::default().validate().is_ok());
    }

    #[test]
    fn non_finite_or_inverted_ranges_rejected() {
        let cases = [
            ParamRange::new(0.0, f64::NAN),
            ParamRange::new(f64::NEG_INFINITY, 1.0),
            ParamRange::new(0.0, f64::INFINITY),
            ParamRange::new(2.0, 1.0),
        ];
        for range in cases {
            let ranges = ParameterRanges {
                weight: range,
                ..ParameterRanges::default()
            };
            match ranges.validate() {
                Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "ranges.weight"),
                other => panic!("{range:?} accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn random_sets_are_valid() {
        let ranges = ParameterRanges::default();
        let mut rng = StdRng::seed_from_u64(12345);
        for i in 0..500 {
            let set = random_parameter_set(&ranges, &mut rng);
            set.validate()
                .unwrap_or_else(|e| panic!("sample {i} invalid: {e}"));
            assert!(set.indicator_count() >= 1);
            assert!(set.instances().all(|(k, _, _)| set.count_of(k) <= 2));
        }
    }

    #[test]
    fn mutation_keeps_structure() {
        let ranges = ParameterRanges::default();
        let mut rng = StdRng::seed_from_u64(7);
        let original = mixed();
        let mut mutated = original.clone();
        mutate(&mut mutated, 20, &ranges, &mut rng);
        assert_eq!(mutated.leaf_count(), original.leaf_count());
        for kind in IndicatorKind::ALL {
            assert_eq!(mutated.count_of(kind), original.count_of(kind));
        }
        assert_ne!(mutated, original);
        mutated.validate().unwrap();
    }

    #[test]
    fn zero_mutations_is_identity() {
        let mut set = mixed();
        mutate(&mut set, 0, &ParameterRanges::default(), &mut StdRng::seed_from_u64(1));
        assert_eq!(set, mixed());
    }

    #[test]
    fn constraints_repaired() {
        let mut set = mixed();
        if let Some(inst) = set.instance_mut(IndicatorKind::Sma, 0) {
            inst.config = IndicatorConfig::Sma { fast: 20, slow: 10 };
        }
        set.threshold.standard_upper = -0.3;
        set.threshold.standard_lower = 0.3;
        fix_cross_field_constraints(&mut set);
        assert_eq!(
            set.indicators[&IndicatorKind::Sma][0].config,
            IndicatorConfig::Sma { fast: 10, slow: 21 }
        );
        assert_eq!(set.threshold.standard_upper, 0.3);
        set.validate().unwrap();
    }

    #[test]
    fn degenerate_range_returns_min() {
        let range = ParamRange::new(3.0, 3.0);
        assert_eq!(range.sample(&mut StdRng::seed_from_u64(0)), 3.0);
    }
}
