//! Signal fusion — weighted combination of normalized splines.
//!
//! Weights need not sum to 1. The combined series is re-normalized onto
//! [-1,1], which is what bounds the output.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::spline::normalize_minus_one_one;

/// Combined signal in [-1,1] with its paired threshold series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSignal {
    pub signal: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

impl FusedSignal {
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }
}

/// Weighted sum of `rows`, re-normalized onto [-1,1].
///
/// Fails when the row count and the weight count differ, when rows have
/// different lengths, or when there is nothing to fuse.
pub fn fuse(rows: &[Vec<f64>], weights: &[f64]) -> Result<Vec<f64>, ConfigError> {
    if rows.len() != weights.len() {
        return Err(ConfigError::LengthMismatch {
            rows: rows.len(),
            weights: weights.len(),
        });
    }
    let Some(first) = rows.first() else {
        return Err(ConfigError::NoIndicators);
    };
    let len = first.len();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != len {
            return Err(ConfigError::RaggedSeries {
                name: format!("row {i}"),
                expected: len,
                actual: row.len(),
            });
        }
    }

    let mut combined = vec![0.0; len];
    for (row, &w) in rows.iter().zip(weights) {
        for (acc, &v) in combined.iter_mut().zip(row) {
            *acc += w * v;
        }
    }
    Ok(normalize_minus_one_one(&combined))
}

/// Modulate `signal` by an auxiliary spline: `s * (1 + amp * aux * std_dev_max)`,
/// then re-normalize.
pub fn modulate_amplitude(
    signal: &[f64],
    aux: &[f64],
    amplification: f64,
    std_dev_max: f64,
) -> Result<Vec<f64>, ConfigError> {
    if aux.len() != signal.len() {
        return Err(ConfigError::RaggedSeries {
            name: "amplifier".to_string(),
            expected: signal.len(),
            actual: aux.len(),
        });
    }
    let modulated: Vec<f64> = signal
        .iter()
        .zip(aux)
        .map(|(&s, &a)| s * (1.0 + amplification * a * std_dev_max))
        .collect();
    Ok(normalize_minus_one_one(&modulated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn single_row_is_renormalized() {
        let out = fuse(&[vec![0.0, 0.5, 1.0]], &[3.0]).unwrap();
        assert_eq!(out, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn weights_combine_rows() {
        let rows = vec![vec![1.0, -1.0, 0.0], vec![0.0, 1.0, 1.0]];
        // combined = [2, -1, 1] with weights [2, 1]
        let out = fuse(&rows, &[2.0, 1.0]).unwrap();
        assert_approx(out[0], 1.0, DEFAULT_EPSILON);
        assert_approx(out[1], -1.0, DEFAULT_EPSILON);
        assert_approx(out[2], 1.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn mismatched_weights_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(
            fuse(&rows, &[1.0]),
            Err(ConfigError::LengthMismatch {
                rows: 2,
                weights: 1
            })
        );
    }

    #[test]
    fn ragged_rows_rejected() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            fuse(&rows, &[1.0, 1.0]),
            Err(ConfigError::RaggedSeries { .. })
        ));
    }

    #[test]
    fn empty_matrix_rejected() {
        assert_eq!(fuse(&[], &[]), Err(ConfigError::NoIndicators));
    }

    #[test]
    fn zero_amplification_keeps_shape() {
        let signal = [-1.0, 0.0, 1.0];
        let out = modulate_amplitude(&signal, &[1.0, 1.0, -1.0], 0.0, 5.0).unwrap();
        assert_eq!(out, signal.to_vec());
    }

    #[test]
    fn amplitude_modulation_stays_bounded() {
        let out = modulate_amplitude(&[-0.5, 0.2, 1.0], &[1.0, -1.0, 0.5], 2.0, 0.3).unwrap();
        assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!(modulate_amplitude(&[1.0], &[], 1.0, 1.0).is_err());
    }
}
