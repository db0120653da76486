//! Throttle — deterministic decay from a start value toward a floor.
//!
//! Two variants share the same decay modes:
//! - [`throttle_count`] for integer quantities (parent count, immigrant count).
//!   Steps down one unit every `interval_size` steps, rounded.
//! - [`throttle`] for ratios (stop-loss tightness, investment ceiling).
//!   Interpolates linearly without rounding.
//!
//! Both return `min_value` once `current_step >= total_steps` under linear decay.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    #[default]
    Constant,
    Linear,
}

/// Integer throttle.
///
/// `interval_size = round(total_steps / (max_value - min_value))`, at least 1;
/// `value = round(max_value - current_step / interval_size)`, floor-clamped at `min_value`.
pub fn throttle_count(
    current_step: usize,
    total_steps: usize,
    max_value: usize,
    min_value: usize,
    mode: DecayMode,
) -> usize {
    match mode {
        DecayMode::Constant => max_value,
        DecayMode::Linear => {
            if max_value <= min_value {
                return max_value.max(min_value);
            }
            if current_step >= total_steps {
                return min_value;
            }
            let span = (max_value - min_value) as f64;
            let interval_size = (total_steps as f64 / span).round().max(1.0);
            let value = (max_value as f64 - current_step as f64 / interval_size).round();
            if value <= min_value as f64 {
                min_value
            } else {
                value as usize
            }
        }
    }
}

/// Ratio throttle: `max_value` at step 0, `min_value` at `total_steps`.
///
/// `min_value` may lie above `max_value`, in which case the value grows.
pub fn throttle(
    current_step: usize,
    total_steps: usize,
    max_value: f64,
    min_value: f64,
    mode: DecayMode,
) -> f64 {
    match mode {
        DecayMode::Constant => max_value,
        DecayMode::Linear => {
            if total_steps == 0 || current_step >= total_steps {
                return min_value;
            }
            let progress = current_step as f64 / total_steps as f64;
            max_value + (min_value - max_value) * progress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_returns_max() {
        for t in 0..20 {
            assert_eq!(throttle_count(t, 10, 8, 2, DecayMode::Constant), 8);
            assert_eq!(throttle(t, 10, 0.9, 0.5, DecayMode::Constant), 0.9);
        }
    }

    #[test]
    fn linear_count_endpoints() {
        assert_eq!(throttle_count(0, 10, 8, 2, DecayMode::Linear), 8);
        assert_eq!(throttle_count(10, 10, 8, 2, DecayMode::Linear), 2);
        assert_eq!(throttle_count(25, 10, 8, 2, DecayMode::Linear), 2);
    }

    #[test]
    fn linear_count_steps_down() {
        // interval_size = round(20 / 4) = 5
        let values: Vec<usize> = (0..20)
            .map(|t| throttle_count(t, 20, 5, 1, DecayMode::Linear))
            .collect();
        assert_eq!(values[0], 5);
        assert_eq!(values[5], 4);
        assert_eq!(values[10], 3);
        assert_eq!(values[19], 1);
        assert!(values.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn degenerate_interval_clamped() {
        // total_steps smaller than the span: interval rounds to 0, clamped to 1
        assert_eq!(throttle_count(0, 2, 10, 0, DecayMode::Linear), 10);
        assert_eq!(throttle_count(1, 2, 10, 0, DecayMode::Linear), 9);
        assert_eq!(throttle_count(2, 2, 10, 0, DecayMode::Linear), 0);
    }

    #[test]
    fn equal_bounds_hold_value() {
        assert_eq!(throttle_count(3, 10, 4, 4, DecayMode::Linear), 4);
    }

    #[test]
    fn linear_ratio_interpolates() {
        assert_eq!(throttle(0, 4, 0.9, 0.5, DecayMode::Linear), 0.9);
        assert!((throttle(2, 4, 0.9, 0.5, DecayMode::Linear) - 0.7).abs() < 1e-12);
        assert_eq!(throttle(4, 4, 0.9, 0.5, DecayMode::Linear), 0.5);
        assert!((throttle(1, 2, 0.2, 0.6, DecayMode::Linear) - 0.4).abs() < 1e-12);
    }
}
