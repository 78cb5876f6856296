//! Prediction scoring.

use crate::error::{EngineError, Result};
use crate::match_record::ResultClass;

/// Goals of (team 1, team 2).
pub type ScorePair = [i64; 2];

pub const EXACT_DECISIVE: u8 = 7;
pub const EXACT_DRAW: u8 = 5;
pub const GOAL_DIFF: u8 = 4;
pub const TENDENCY: u8 = 2;

/// Points of one predicted score against the true one.
pub fn ak_points(truth: ScorePair, pred: ScorePair) -> u8 {
    let true_class = ResultClass::from_goals(truth[0], truth[1]);
    let pred_class = ResultClass::from_goals(pred[0], pred[1]);
    let decisive = true_class != ResultClass::Draw;

    if truth == pred {
        if decisive { EXACT_DECISIVE } else { EXACT_DRAW }
    } else if decisive && truth[0] - truth[1] == pred[0] - pred[1] {
        GOAL_DIFF
    } else if true_class == pred_class {
        TENDENCY
    } else {
        0
    }
}

pub fn ak_score(truth: &[ScorePair], pred: &[ScorePair]) -> Result<Vec<u8>> {
    if truth.len() != pred.len() {
        return Err(EngineError::ShapeMismatch {
            left: format!("[{}, 2]", truth.len()),
            right: format!("[{}, 2]", pred.len()),
        });
    }
    Ok(truth
        .iter()
        .zip(pred)
        .map(|(t, p)| ak_points(*t, *p))
        .collect())
}

/// Arithmetic mean of [`ak_score`]; `0.0` for no matches.
pub fn mean_ak_score(truth: &[ScorePair], pred: &[ScorePair]) -> Result<f64> {
    let scores = ak_score(truth, pred)?;
    if scores.is_empty() {
        return Ok(0.0);
    }
    let total: u64 = scores.iter().map(|s| u64::from(*s)).sum();
    Ok(total as f64 / scores.len() as f64)
}

/// Mean over target columns of the mean Poisson deviance
/// `2 * (y * ln(y / mu) - y + mu)`. Rows are matches, columns are targets.
pub fn multi_mean_poisson_deviance(y_true: &[Vec<f64>], y_pred: &[Vec<f64>]) -> Result<f64> {
    let shape = |rows: &[Vec<f64>]| {
        let width = rows.first().map(Vec::len).unwrap_or_default();
        format!("[{}, {}]", rows.len(), width)
    };
    let mismatch = || EngineError::ShapeMismatch {
        left: shape(y_true),
        right: shape(y_pred),
    };
    if y_true.len() != y_pred.len() || y_true.is_empty() {
        return Err(mismatch());
    }
    let width = y_true[0].len();
    if width == 0
        || y_true
            .iter()
            .zip(y_pred)
            .any(|(t, p)| t.len() != width || p.len() != width)
    {
        return Err(mismatch());
    }

    let mut column_sums = vec![0.0_f64; width];
    for (t_row, p_row) in y_true.iter().zip(y_pred) {
        for (col, (&y, &mu)) in t_row.iter().zip(p_row).enumerate() {
            if mu <= 0.0 || !mu.is_finite() {
                return Err(EngineError::invalid(mu.to_string(), &["prediction > 0"]));
            }
            if y < 0.0 || !y.is_finite() {
                return Err(EngineError::invalid(y.to_string(), &["target >= 0"]));
            }
            column_sums[col] += poisson_deviance(y, mu);
        }
    }

    let n = y_true.len() as f64;
    Ok(column_sums.iter().map(|s| s / n).sum::<f64>() / width as f64)
}

fn poisson_deviance(y: f64, mu: f64) -> f64 {
    if y == 0.0 {
        2.0 * mu
    } else {
        2.0 * (y * (y / mu).ln() - y + mu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deviance_is_zero_for_perfect_predictions() {
        let y = vec![vec![1.0, 2.0], vec![3.0, 1.0]];
        let d = multi_mean_poisson_deviance(&y, &y).unwrap();
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn deviance_of_zero_target_is_twice_prediction() {
        let d = multi_mean_poisson_deviance(&[vec![0.0]], &[vec![0.5]]).unwrap();
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn deviance_averages_columns() {
        // Column 0 perfect, column 1 a single zero target with mu = 2.
        let d = multi_mean_poisson_deviance(&[vec![1.0, 0.0]], &[vec![1.0, 2.0]]).unwrap();
        assert!((d - 2.0).abs() < 1e-12);
    }

    #[test]
    fn deviance_rejects_bad_inputs() {
        assert!(multi_mean_poisson_deviance(&[vec![1.0]], &[vec![0.0]]).is_err());
        assert!(multi_mean_poisson_deviance(&[vec![-1.0]], &[vec![1.0]]).is_err());
        assert!(matches!(
            multi_mean_poisson_deviance(&[vec![1.0, 2.0]], &[vec![1.0]]),
            Err(EngineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean_ak_score(&[], &[]).unwrap(), 0.0);
    }
}
