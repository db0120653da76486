//! Persisted nested-map form of a parameter set.
//!
//! ```text
//! indicators_count                  { rsi: 1, sma: 1, ... }
//! indicator_properties.timeframes   { rsi_0, sma_0_1, sma_0_2, ..., volatility_0, threshold_timeframe }
//! indicator_properties.rsi_standard_{upper,lower}_thresholds { rsi_0 }
//! spline_property.{smoothing_factors, weights, flip}          { <kind>_<i> }
//! spline_property.amplification_factor                        { volume_0, volatility_0 }
//! spline_property.major_spline_standard_{upper,lower}_thresholds
//! general_settings                  { threshold_setting, buffer, band_width }
//! ```
//!
//! Every declared indicator instance needs every per-instance key; a missing
//! key is a [`ConfigError::MissingKey`]. Amplifier keys fall back to defaults
//! and `threshold_timeframe` is only required in rolling-band mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AmplifierParams, AmplifierProperties, IndicatorInstance, ParameterSet};
use crate::error::ConfigError;
use crate::indicators::{IndicatorConfig, IndicatorKind};
use crate::spline::SplineProperties;
use crate::threshold::{ThresholdMode, ThresholdParams};

const VOLUME_KEY: &str = "volume_0";
const VOLATILITY_KEY: &str = "volatility_0";
const THRESHOLD_TIMEFRAME_KEY: &str = "threshold_timeframe";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIndicatorProperties {
    #[serde(default)]
    pub timeframes: BTreeMap<String, usize>,
    #[serde(default)]
    pub rsi_standard_upper_thresholds: BTreeMap<String, f64>,
    #[serde(default)]
    pub rsi_standard_lower_thresholds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSplineProperty {
    #[serde(default)]
    pub smoothing_factors: BTreeMap<String, f64>,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub flip: BTreeMap<String, bool>,
    #[serde(default)]
    pub amplification_factor: BTreeMap<String, f64>,
    pub major_spline_standard_upper_thresholds: f64,
    pub major_spline_standard_lower_thresholds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGeneralSettings {
    #[serde(default)]
    pub threshold_setting: ThresholdMode,
    #[serde(default, alias = "buffer_setting")]
    pub buffer: f64,
    #[serde(default = "default_band_width")]
    pub band_width: f64,
}

fn default_band_width() -> f64 {
    ThresholdParams::default().band_width
}

impl Default for RawGeneralSettings {
    fn default() -> Self {
        Self {
            threshold_setting: ThresholdMode::Standard,
            buffer: 0.0,
            band_width: default_band_width(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawParameterSet {
    pub indicators_count: BTreeMap<String, usize>,
    #[serde(default)]
    pub indicator_properties: RawIndicatorProperties,
    pub spline_property: RawSplineProperty,
    #[serde(default)]
    pub general_settings: RawGeneralSettings,
}

fn lookup<T: Copy>(map: &BTreeMap<String, T>, section: &str, key: &str) -> Result<T, ConfigError> {
    map.get(key)
        .copied()
        .ok_or_else(|| ConfigError::missing(section, key))
}

impl RawParameterSet {
    fn timeframe(&self, key: &str) -> Result<usize, ConfigError> {
        lookup(&self.indicator_properties.timeframes, "timeframes", key)
    }

    fn indicator_config(&self, kind: IndicatorKind, key: &str) -> Result<IndicatorConfig, ConfigError> {
        let config = match kind {
            IndicatorKind::Rsi => IndicatorConfig::Rsi {
                timeframe: self.timeframe(key)?,
                upper_threshold: lookup(
                    &self.indicator_properties.rsi_standard_upper_thresholds,
                    "rsi_standard_upper_thresholds",
                    key,
                )?,
                lower_threshold: lookup(
                    &self.indicator_properties.rsi_standard_lower_thresholds,
                    "rsi_standard_lower_thresholds",
                    key,
                )?,
            },
            IndicatorKind::Sma => IndicatorConfig::Sma {
                fast: self.timeframe(&format!("{key}_1"))?,
                slow: self.timeframe(&format!("{key}_2"))?,
            },
            IndicatorKind::Ema => IndicatorConfig::Ema {
                fast: self.timeframe(&format!("{key}_1"))?,
                slow: self.timeframe(&format!("{key}_2"))?,
            },
            IndicatorKind::Lwma => IndicatorConfig::Lwma {
                timeframe: self.timeframe(key)?,
            },
            IndicatorKind::Cci => IndicatorConfig::Cci {
                timeframe: self.timeframe(key)?,
            },
            IndicatorKind::Eom => IndicatorConfig::Eom {
                timeframe: self.timeframe(key)?,
            },
            IndicatorKind::OcGradient => IndicatorConfig::OcGradient,
        };
        Ok(config)
    }

    fn spline(&self, key: &str) -> Result<SplineProperties, ConfigError> {
        let sp = &self.spline_property;
        Ok(SplineProperties {
            smoothing_factor: lookup(&sp.smoothing_factors, "smoothing_factors", key)?,
            weight: lookup(&sp.weights, "weights", key)?,
            flip: lookup(&sp.flip, "flip", key)?,
        })
    }

    fn amplifiers(&self) -> AmplifierParams {
        let sp = &self.spline_property;
        let defaults = AmplifierParams::default();
        let props = |key: &str, fallback: AmplifierProperties| AmplifierProperties {
            smoothing_factor: sp
                .smoothing_factors
                .get(key)
                .copied()
                .unwrap_or(fallback.smoothing_factor),
            amplification: sp
                .amplification_factor
                .get(key)
                .copied()
                .unwrap_or(fallback.amplification),
        };
        AmplifierParams {
            volume: props(VOLUME_KEY, defaults.volume),
            volatility: props(VOLATILITY_KEY, defaults.volatility),
            volatility_timeframe: self
                .indicator_properties
                .timeframes
                .get(VOLATILITY_KEY)
                .copied()
                .unwrap_or(defaults.volatility_timeframe),
        }
    }

    fn threshold(&self) -> Result<ThresholdParams, ConfigError> {
        let general = &self.general_settings;
        let timeframe = match general.threshold_setting {
            ThresholdMode::RollingBand => self.timeframe(THRESHOLD_TIMEFRAME_KEY)?,
            ThresholdMode::Standard => self
                .indicator_properties
                .timeframes
                .get(THRESHOLD_TIMEFRAME_KEY)
                .copied()
                .unwrap_or(ThresholdParams::default().timeframe),
        };
        Ok(ThresholdParams {
            mode: general.threshold_setting,
            standard_upper: self.spline_property.major_spline_standard_upper_thresholds,
            standard_lower: self.spline_property.major_spline_standard_lower_thresholds,
            buffer: general.buffer,
            band_width: general.band_width,
            timeframe,
        })
    }

    /// Build and validate the typed form.
    pub fn to_typed(&self) -> Result<ParameterSet, ConfigError> {
        let mut indicators = BTreeMap::new();
        for (name, &count) in &self.indicators_count {
            let kind: IndicatorKind = name.parse()?;
            if count == 0 {
                continue;
            }
            let mut instances = Vec::with_capacity(count);
            for i in 0..count {
                let key = kind.instance_key(i);
                instances.push(IndicatorInstance {
                    config: self.indicator_config(kind, &key)?,
                    spline: self.spline(&key)?,
                });
            }
            indicators.insert(kind, instances);
        }
        let set = ParameterSet {
            indicators,
            amplifiers: self.amplifiers(),
            threshold: self.threshold()?,
        };
        set.validate()?;
        Ok(set)
    }
}

impl From<&ParameterSet> for RawParameterSet {
    fn from(set: &ParameterSet) -> Self {
        let mut indicators_count = BTreeMap::new();
        let mut props = RawIndicatorProperties::default();
        let mut smoothing_factors = BTreeMap::new();
        let mut weights = BTreeMap::new();
        let mut flip = BTreeMap::new();

        for kind in IndicatorKind::ALL {
            indicators_count.insert(kind.key().to_string(), set.count_of(kind));
        }
        for (kind, index, inst) in set.instances() {
            let key = kind.instance_key(index);
            match inst.config {
                IndicatorConfig::Rsi {
                    timeframe,
                    upper_threshold,
                    lower_threshold,
                } => {
                    props.timeframes.insert(key.clone(), timeframe);
                    props
                        .rsi_standard_upper_thresholds
                        .insert(key.clone(), upper_threshold);
                    props
                        .rsi_standard_lower_thresholds
                        .insert(key.clone(), lower_threshold);
                }
                IndicatorConfig::Sma { fast, slow } | IndicatorConfig::Ema { fast, slow } => {
                    props.timeframes.insert(format!("{key}_1"), fast);
                    props.timeframes.insert(format!("{key}_2"), slow);
                }
                IndicatorConfig::Lwma { timeframe }
                | IndicatorConfig::Cci { timeframe }
                | IndicatorConfig::Eom { timeframe } => {
                    props.timeframes.insert(key.clone(), timeframe);
                }
                IndicatorConfig::OcGradient => {}
            }
            smoothing_factors.insert(key.clone(), inst.spline.smoothing_factor);
            weights.insert(key.clone(), inst.spline.weight);
            flip.insert(key, inst.spline.flip);
        }

        let amp = &set.amplifiers;
        props
            .timeframes
            .insert(VOLATILITY_KEY.to_string(), amp.volatility_timeframe);
        props
            .timeframes
            .insert(THRESHOLD_TIMEFRAME_KEY.to_string(), set.threshold.timeframe);
        smoothing_factors.insert(VOLUME_KEY.to_string(), amp.volume.smoothing_factor);
        smoothing_factors.insert(VOLATILITY_KEY.to_string(), amp.volatility.smoothing_factor);
        let mut amplification_factor = BTreeMap::new();
        amplification_factor.insert(VOLUME_KEY.to_string(), amp.volume.amplification);
        amplification_factor.insert(VOLATILITY_KEY.to_string(), amp.volatility.amplification);

        RawParameterSet {
            indicators_count,
            indicator_properties: props,
            spline_property: RawSplineProperty {
                smoothing_factors,
                weights,
                flip,
                amplification_factor,
                major_spline_standard_upper_thresholds: set.threshold.standard_upper,
                major_spline_standard_lower_thresholds: set.threshold.standard_lower,
            },
            general_settings: RawGeneralSettings {
                threshold_setting: set.threshold.mode,
                buffer: set.threshold.buffer,
                band_width: set.threshold.band_width,
            },
        }
    }
}
