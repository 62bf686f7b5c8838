//! Optimal epoch by sample-weighted validation error

use ndarray::{Array1, Array2};

use crate::{JesterError, Result};

/// The chosen epoch and the per-epoch scores it was chosen from
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSelection {
    pub epoch: usize,
    /// weights · validation column, one per epoch
    pub weighted_errors: Vec<f64>,
}

impl EpochSelection {
    pub fn best_error(&self) -> f64 {
        self.weighted_errors[self.epoch]
    }
}

/// Per-epoch weighted sums of a [pairs, epochs] curve
pub fn weighted_errors(curve: &Array2<f64>, weights: &[f64]) -> Result<Vec<f64>> {
    let (pairs, epochs) = curve.dim();
    if weights.len() != pairs {
        return Err(JesterError::DataIntegrity(format!(
            "{} pair weights for a curve of {} pairs",
            weights.len(),
            pairs
        )));
    }
    if epochs == 0 {
        return Err(JesterError::DataIntegrity(
            "Validation curve has no epochs".to_string(),
        ));
    }

    let weights = Array1::from(weights.to_vec());
    Ok(weights.dot(curve).to_vec())
}

/// Pick the epoch minimising `weights · curve[:, epoch]`
///
/// Exact ties go to the earliest epoch.
pub fn select_epoch(val_curve: &Array2<f64>, weights: &[f64]) -> Result<EpochSelection> {
    let weighted_errors = weighted_errors(val_curve, weights)?;

    let mut epoch = 0;
    for (candidate, &error) in weighted_errors.iter().enumerate().skip(1) {
        if error < weighted_errors[epoch] {
            epoch = candidate;
        }
    }

    log::info!(
        "Optimal epoch: {} (weighted validation error {:.4})",
        epoch,
        weighted_errors[epoch]
    );

    Ok(EpochSelection {
        epoch,
        weighted_errors,
    })
}

/// Pair sample counts as selector weights
pub fn count_weights(counts: &[usize]) -> Vec<f64> {
    counts.iter().map(|&c| c as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_weighted_selection() {
        let curve = array![[0.5, 0.4], [0.3, 0.35]];
        let selection = select_epoch(&curve, &[9900.0, 10200.0]).unwrap();

        assert_eq!(selection.weighted_errors.len(), 2);
        assert!((selection.weighted_errors[0] - 8010.0).abs() < 1e-9);
        assert!((selection.weighted_errors[1] - 7530.0).abs() < 1e-9);
        assert_eq!(selection.epoch, 1);
        assert!((selection.best_error() - 7530.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_goes_to_first_epoch() {
        // Epochs 0 and 2 both sum to 3.0
        let curve = array![[1.0, 2.0, 1.25], [1.0, 1.5, 0.5]];
        let selection = select_epoch(&curve, &[2.0, 1.0]).unwrap();
        assert_eq!(selection.weighted_errors, vec![3.0, 5.5, 3.0]);
        assert_eq!(selection.epoch, 0);

        let flat = array![[0.25, 0.25, 0.25]];
        assert_eq!(select_epoch(&flat, &[4.0]).unwrap().epoch, 0);
    }

    #[test]
    fn test_weights_change_the_choice() {
        // Equal weights pick epoch 0; a dominant second pair prefers epoch 1
        let curve = array![[0.2, 0.6], [0.9, 0.6]];
        assert_eq!(select_epoch(&curve, &[1.0, 1.0]).unwrap().epoch, 0);
        assert_eq!(select_epoch(&curve, &[10.0, 1.0]).unwrap().epoch, 0);
        assert_eq!(select_epoch(&curve, &[1.0, 10.0]).unwrap().epoch, 1);
    }

    #[test]
    fn test_shape_mismatch() {
        let curve = array![[0.5, 0.4], [0.3, 0.35]];
        assert!(select_epoch(&curve, &[1.0]).is_err());

        let empty = Array2::<f64>::zeros((2, 0));
        assert!(select_epoch(&empty, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn test_count_weights() {
        assert_eq!(count_weights(&[9900, 10200]), vec![9900.0, 10200.0]);
    }
}
