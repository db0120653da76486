//! Parameter sets — the genome the optimizer evolves.
//!
//! [`ParameterSet`] is the typed form used by the pipeline: a map from
//! indicator kind to its ordered instances, plus amplifier and threshold
//! settings. [`RawParameterSet`] is the nested string-keyed form used for
//! persistence. Conversion from raw to typed fails on any missing
//! per-instance key.
//!
//! Every scalar in a set is a "leaf". Mutation replaces whole leaves with
//! fresh random values; the set of indicator instances never changes.

pub mod ranges;
pub mod raw;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::indicators::{IndicatorConfig, IndicatorKind};
use crate::spline::SplineProperties;
use crate::threshold::ThresholdParams;

pub use ranges::{mutate, random_parameter_set, ParamRange, ParameterRanges};
pub use raw::RawParameterSet;

/// One indicator row of the fusion matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorInstance {
    pub config: IndicatorConfig,
    pub spline: SplineProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplifierProperties {
    pub smoothing_factor: f64,
    pub amplification: f64,
}

impl Default for AmplifierProperties {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.0,
            amplification: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplifierParams {
    pub volume: AmplifierProperties,
    pub volatility: AmplifierProperties,
    pub volatility_timeframe: usize,
}

impl Default for AmplifierParams {
    fn default() -> Self {
        Self {
            volume: AmplifierProperties::default(),
            volatility: AmplifierProperties::default(),
            volatility_timeframe: 10,
        }
    }
}

/// Typed parameter set. Plain values throughout, so `clone()` is a deep copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub indicators: BTreeMap<IndicatorKind, Vec<IndicatorInstance>>,
    pub amplifiers: AmplifierParams,
    pub threshold: ThresholdParams,
}

/// Which field of an indicator instance a leaf addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Timeframe,
    Fast,
    Slow,
    RsiUpper,
    RsiLower,
    Smoothing,
    Weight,
    Flip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmplifierField {
    VolumeSmoothing,
    VolumeAmplification,
    VolatilityTimeframe,
    VolatilitySmoothing,
    VolatilityAmplification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdField {
    Mode,
    StandardUpper,
    StandardLower,
    Buffer,
    BandWidth,
    Timeframe,
}

/// Address of one mutable scalar in a parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leaf {
    Indicator {
        kind: IndicatorKind,
        index: usize,
        field: IndicatorField,
    },
    Amplifier(AmplifierField),
    Threshold(ThresholdField),
}

const SPLINE_FIELDS: [IndicatorField; 3] = [
    IndicatorField::Smoothing,
    IndicatorField::Weight,
    IndicatorField::Flip,
];

const AMPLIFIER_FIELDS: [AmplifierField; 5] = [
    AmplifierField::VolumeSmoothing,
    AmplifierField::VolumeAmplification,
    AmplifierField::VolatilityTimeframe,
    AmplifierField::VolatilitySmoothing,
    AmplifierField::VolatilityAmplification,
];

const THRESHOLD_FIELDS: [ThresholdField; 6] = [
    ThresholdField::Mode,
    ThresholdField::StandardUpper,
    ThresholdField::StandardLower,
    ThresholdField::Buffer,
    ThresholdField::BandWidth,
    ThresholdField::Timeframe,
];

fn config_fields(config: &IndicatorConfig) -> &'static [IndicatorField] {
    match config {
        IndicatorConfig::Rsi { .. } => &[
            IndicatorField::Timeframe,
            IndicatorField::RsiUpper,
            IndicatorField::RsiLower,
        ],
        IndicatorConfig::Sma { .. } | IndicatorConfig::Ema { .. } => {
            &[IndicatorField::Fast, IndicatorField::Slow]
        }
        IndicatorConfig::Lwma { .. } | IndicatorConfig::Cci { .. } | IndicatorConfig::Eom { .. } => {
            &[IndicatorField::Timeframe]
        }
        IndicatorConfig::OcGradient => &[],
    }
}

impl ParameterSet {
    /// Instances in fusion row order: kind declaration order, then index.
    pub fn instances(&self) -> impl Iterator<Item = (IndicatorKind, usize, &IndicatorInstance)> {
        self.indicators
            .iter()
            .flat_map(|(&kind, list)| list.iter().enumerate().map(move |(i, inst)| (kind, i, inst)))
    }

    pub fn indicator_count(&self) -> usize {
        self.indicators.values().map(Vec::len).sum()
    }

    pub fn count_of(&self, kind: IndicatorKind) -> usize {
        self.indicators.get(&kind).map_or(0, Vec::len)
    }

    pub fn instance_mut(&mut self, kind: IndicatorKind, index: usize) -> Option<&mut IndicatorInstance> {
        self.indicators.get_mut(&kind).and_then(|list| list.get_mut(index))
    }

    pub fn weights(&self) -> Vec<f64> {
        self.instances().map(|(_, _, inst)| inst.spline.weight).collect()
    }

    /// Check every instance config and the threshold settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indicator_count() == 0 {
            return Err(ConfigError::NoIndicators);
        }
        for (kind, index, inst) in self.instances() {
            if inst.config.kind() != kind {
                return Err(ConfigError::invalid(
                    kind.instance_key(index),
                    format!("config of kind '{}' filed under '{kind}'", inst.config.kind()),
                ));
            }
            inst.config.validate()?;
        }
        self.threshold.validate()
    }

    /// Every mutable scalar, in a stable order.
    pub fn leaves(&self) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        for (kind, index, inst) in self.instances() {
            for &field in config_fields(&inst.config).iter().chain(SPLINE_FIELDS.iter()) {
                leaves.push(Leaf::Indicator { kind, index, field });
            }
        }
        leaves.extend(AMPLIFIER_FIELDS.iter().copied().map(Leaf::Amplifier));
        leaves.extend(THRESHOLD_FIELDS.iter().copied().map(Leaf::Threshold));
        leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    pub fn to_raw(&self) -> RawParameterSet {
        RawParameterSet::from(self)
    }
}

impl TryFrom<RawParameterSet> for ParameterSet {
    type Error = ConfigError;

    fn try_from(raw: RawParameterSet) -> Result<Self, Self::Error> {
        raw.to_typed()
    }
}


#[cfg(test)]
mod tests {
    use super::test_sets::*;
    use super::*;

    #[test]
    fn instances_follow_kind_order() {
        let set = mixed();
        let kinds: Vec<IndicatorKind> = set.instances().map(|(k, _, _)| k).collect();
        assert_eq!(
            kinds,
            vec![IndicatorKind::Rsi, IndicatorKind::Sma, IndicatorKind::OcGradient]
        );
        assert_eq!(set.weights(), vec![0.5, 1.0, 0.25]);
    }

    #[test]
    fn leaf_count_covers_every_scalar() {
        // rsi 3+3, sma 2+3, oc_gradient 0+3, amplifiers 5, threshold 6
        assert_eq!(mixed().leaf_count(), 6 + 5 + 3 + 5 + 6);
    }

    #[test]
    fn empty_set_rejected() {
        let mut set = single_sma(3, 8, false);
        set.indicators.clear();
        assert_eq!(set.validate(), Err(ConfigError::NoIndicators));
    }

    #[test]
    fn misfiled_config_rejected() {
        let mut set = single_sma(3, 8, false);
        let inst = set.indicators[&IndicatorKind::Sma][0].clone();
        set.indicators.insert(IndicatorKind::Ema, vec![inst]);
        assert!(set.validate().is_err());
    }

    #[test]
    fn clone_is_independent() {
        let original = mixed();
        let mut copy = original.clone();
        if let Some(inst) = copy.instance_mut(IndicatorKind::Sma, 0) {
            inst.spline.weight = 9.0;
        }
        assert_eq!(original.indicators[&IndicatorKind::Sma][0].spline.weight, 1.0);
        assert_ne!(original, copy);
    }
}
