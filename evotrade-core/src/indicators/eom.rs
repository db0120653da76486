//! Ease of Movement, SMA-smoothed.
//!
//! EMV[t] = midpoint move / box ratio, where the midpoint move is
//! `(h[t]+l[t])/2 - (h[t-1]+l[t-1])/2` and the box ratio is
//! `(volume / EOM_VOLUME_SCALE) / (h[t] - l[t])`. Zero range or zero volume reads 0.
//! Lookback: timeframe (one bar for the first move, then the average).

use super::{neutral_fill, sma_of_series, Indicator, IndicatorKind};
use crate::domain::Bar;

pub const EOM_VOLUME_SCALE: f64 = 100_000_000.0;

#[derive(Debug, Clone)]
pub struct Eom {
    timeframe: usize,
    name: String,
}

impl Eom {
    pub fn new(timeframe: usize) -> Self {
        Self {
            timeframe,
            name: format!("eom_{timeframe}"),
        }
    }
}

fn ease_of_movement(prev: &Bar, bar: &Bar) -> f64 {
    let range = bar.high - bar.low;
    if range == 0.0 || bar.volume == 0.0 {
        return 0.0;
    }
    let moved = (bar.high + bar.low) / 2.0 - (prev.high + prev.low) / 2.0;
    moved / ((bar.volume / EOM_VOLUME_SCALE) / range)
}

impl Indicator for Eom {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Eom
    }

    fn lookback(&self) -> usize {
        self.timeframe
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut values = vec![0.0; n];
        if n < 2 {
            return values;
        }
        let emv: Vec<f64> = bars.windows(2).map(|w| ease_of_movement(&w[0], &w[1])).collect();
        let smoothed = sma_of_series(&emv, self.timeframe);
        // emv[i] belongs to bar i + 1
        values[1..].copy_from_slice(&smoothed);
        neutral_fill(&mut values);
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn rising_midpoints_are_positive() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + 2.0 * i as f64).collect();
        let values = Eom::new(3).compute(&make_bars(&closes));
        assert!(values[..3].iter().all(|&v| v == 0.0));
        assert!(values[3..].iter().all(|&v| v > 0.0));
    }

    #[test]
    fn single_step_value() {
        let bars = make_bars(&[10.0, 12.0]);
        // bar0: h=11 l=9 mid=10; bar1: open=10 close=12 h=13 l=9 mid=11, range 4
        let expected = 1.0 / ((1000.0 / EOM_VOLUME_SCALE) / 4.0);
        let values = Eom::new(1).compute(&bars);
        assert_eq!(values[0], 0.0);
        assert_approx(values[1], expected, DEFAULT_EPSILON);
    }

    #[test]
    fn zero_volume_is_neutral() {
        let mut bars = make_bars(&[10.0, 12.0, 14.0]);
        for b in &mut bars {
            b.volume = 0.0;
        }
        assert!(Eom::new(1).compute(&bars).iter().all(|&v| v == 0.0));
    }
}
