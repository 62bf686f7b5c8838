//! Experiment-level error curves across epochs
//!
//! Training error is the plain mean over pairs; validation error is weighted
//! by each pair's share of validation ratings.

use std::path::Path;

use ndarray::{Array2, Axis};
use serde::Serialize;

use crate::evaluation::selector::weighted_errors;
use crate::{JesterError, Result};

/// One epoch of the summary curve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    /// 1-based, as shown to users
    pub epoch: usize,
    pub train_mae: f64,
    pub val_mae: f64,
}

/// Combine [pairs, epochs] curves into one point per epoch
pub fn summarize(
    train_curve: &Array2<f64>,
    val_curve: &Array2<f64>,
    counts: &[usize],
) -> Result<Vec<CurvePoint>> {
    if train_curve.dim() != val_curve.dim() {
        return Err(JesterError::DataIntegrity(format!(
            "Training curve {:?} and validation curve {:?} differ in shape",
            train_curve.dim(),
            val_curve.dim()
        )));
    }

    let total: usize = counts.iter().sum();
    if total == 0 {
        return Err(JesterError::DataIntegrity(
            "Pair rating counts sum to zero".to_string(),
        ));
    }
    let shares: Vec<f64> = counts.iter().map(|&c| c as f64 / total as f64).collect();
    let val = weighted_errors(val_curve, &shares)?;
    let train = train_curve.mean_axis(Axis(0)).ok_or_else(|| {
        JesterError::DataIntegrity("Training curve has no pairs".to_string())
    })?;

    Ok(train
        .iter()
        .zip(val)
        .enumerate()
        .map(|(epoch, (&train_mae, val_mae))| CurvePoint {
            epoch: epoch + 1,
            train_mae,
            val_mae,
        })
        .collect())
}

/// Write the summary as `epoch,train_mae,val_mae`
pub fn write_csv(points: &[CurvePoint], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for point in points {
        writer.serialize(point)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_summarize() {
        let train = array![[1.0, 0.5], [3.0, 1.5]];
        let val = array![[2.0, 1.0], [4.0, 3.0]];
        let points = summarize(&train, &val, &[3, 1]).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].epoch, 1);
        assert_eq!(points[0].train_mae, 2.0);
        assert_eq!(points[1].train_mae, 1.0);
        assert!((points[0].val_mae - 2.5).abs() < 1e-12);
        assert!((points[1].val_mae - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let train = array![[1.0, 0.5]];
        let val = array![[2.0]];
        assert!(summarize(&train, &val, &[1]).is_err());
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curves/mlp_30.csv");
        let points = vec![CurvePoint {
            epoch: 1,
            train_mae: 0.5,
            val_mae: 0.75,
        }];
        write_csv(&points, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "epoch,train_mae,val_mae\n1,0.5,0.75\n");
    }
}
