//! Signal pipeline — indicators → splines → fusion → thresholds → decisions.
//!
//! One call builds the complete signal model for one parameter set over one
//! slice of bars. Nothing here mutates shared state; callers may run many
//! pipelines in parallel over the same bars.

use tracing::trace;

use crate::domain::{Bar, DecisionStream};
use crate::error::ConfigError;
use crate::fusion::{fuse, modulate_amplitude, FusedSignal};
use crate::indicators::{Volatility, Volume};
use crate::params::ParameterSet;
use crate::settings::ModelSettings;
use crate::spline::{align_to_steps, build_spline};
use crate::threshold::{compute_thresholds, decide};

/// Output of one pipeline run, one sample per price step.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalModel {
    pub fused: FusedSignal,
    pub decisions: DecisionStream,
}

impl SignalModel {
    pub fn len(&self) -> usize {
        self.fused.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fused.is_empty()
    }
}

/// Build the fused signal and decision stream for `params` over `bars`.
pub fn build_signal(
    bars: &[Bar],
    params: &ParameterSet,
    settings: &ModelSettings,
) -> Result<SignalModel, ConfigError> {
    settings.validate()?;
    params.validate()?;
    let factor = settings.interpolation_factor;

    let mut rows = Vec::with_capacity(params.indicator_count());
    for (_, _, inst) in params.instances() {
        let indicator = inst.config.build()?;
        let raw = indicator.compute(bars);
        trace!(indicator = indicator.name(), len = raw.len(), "indicator computed");
        rows.push(build_spline(
            &raw,
            inst.spline.smoothing_factor,
            inst.spline.flip,
            factor,
        ));
    }
    let mut combined = fuse(&rows, &params.weights())?;

    if settings.amplitude_modulation {
        let amp = &params.amplifiers;
        let volume = build_spline(&Volume.compute(bars), amp.volume.smoothing_factor, false, factor);
        combined = modulate_amplitude(
            &combined,
            &volume,
            amp.volume.amplification,
            settings.volume_std_dev_max,
        )?;
        let volatility = build_spline(
            &Volatility::new(amp.volatility_timeframe).compute(bars),
            amp.volatility.smoothing_factor,
            false,
            factor,
        );
        combined = modulate_amplitude(
            &combined,
            &volatility,
            amp.volatility.amplification,
            settings.volatility_std_dev_max,
        )?;
    }

    let signal = align_to_steps(&combined, factor);
    let (upper, lower) = compute_thresholds(&signal, &params.threshold);
    let decisions = decide(&signal, &upper, &lower);
    Ok(SignalModel {
        fused: FusedSignal {
            signal,
            upper,
            lower,
        },
        decisions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeDecision;
    use crate::indicators::make_bars;
    use crate::params::test_sets::{mixed, single_sma};

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 10.0 * ((i as f64) * 0.4).sin() + i as f64 * 0.2)
            .collect()
    }

    #[test]
    fn one_sample_per_step() {
        let bars = make_bars(&zigzag(60));
        for factor in [1, 3] {
            let settings = ModelSettings {
                interpolation_factor: factor,
                ..ModelSettings::default()
            };
            let model = build_signal(&bars, &mixed(), &settings).unwrap();
            assert_eq!(model.len(), 60);
            assert_eq!(model.fused.upper.len(), 60);
            assert_eq!(model.decisions.len(), 60);
            assert!(model.fused.signal.iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn amplitude_modulation_stays_bounded() {
        let mut bars = make_bars(&zigzag(60));
        for (i, b) in bars.iter_mut().enumerate() {
            b.volume = 1000.0 + (i % 7) as f64 * 150.0;
        }
        let mut params = mixed();
        params.amplifiers.volume.amplification = 0.8;
        params.amplifiers.volatility.amplification = 0.5;
        let settings = ModelSettings {
            amplitude_modulation: true,
            ..ModelSettings::default()
        };
        let model = build_signal(&bars, &params, &settings).unwrap();
        assert!(model.fused.signal.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn invalid_params_surface_config_error() {
        let bars = make_bars(&zigzag(30));
        let params = single_sma(10, 5, false);
        assert!(build_signal(&bars, &params, &ModelSettings::default()).is_err());
    }

    #[test]
    fn rising_series_with_flipped_trend_buys() {
        // Crossover spread is 0 during the lookback, then jumps positive and
        // decays; flipped, the signal starts high and falls through -0.5.
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let model = build_signal(&bars, &single_sma(2, 5, true), &ModelSettings::default()).unwrap();
        assert!(model
            .decisions
            .decisions
            .iter()
            .any(|&d| d == TradeDecision::Buy));
    }
}
