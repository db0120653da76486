//! Gradient of the open/close midpoint.

use super::{Indicator, IndicatorKind};
use crate::domain::Bar;

/// `mid[t] - mid[t-1]` with `mid = (open + close) / 2`; 0 at t = 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct OcGradient;

impl Indicator for OcGradient {
    fn name(&self) -> &str {
        "oc_gradient"
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::OcGradient
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut values = vec![0.0; bars.len()];
        for i in 1..bars.len() {
            let diff = bars[i].oc_mid() - bars[i - 1].oc_mid();
            values[i] = if diff.is_finite() { diff } else { 0.0 };
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn gradient_of_midpoints() {
        // mids: 10, 10.5, 11.5, 11.5
        let bars = make_bars(&[10.0, 11.0, 12.0, 11.0]);
        let values = OcGradient.compute(&bars);
        assert_eq!(values[0], 0.0);
        assert_approx(values[1], 0.5, DEFAULT_EPSILON);
        assert_approx(values[2], 1.0, DEFAULT_EPSILON);
        assert_approx(values[3], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn empty_input() {
        assert!(OcGradient.compute(&[]).is_empty());
    }
}
