//! Comparison reports for the selected epoch
//!
//! The model's ranking orders every table, baselines included, so column k
//! always refers to the user's k-th recommended joke.

pub mod ranking;
pub mod severity;
pub mod writer;

use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::data::Baselines;
use crate::{JesterError, Proportion, Result, UserId};

pub use ranking::{absolute_error, restore_order, Ranking};
pub use severity::{classify_matrix, Severity, SeverityCounts};
pub use writer::write_table;

/// Reordered absolute errors of one estimator, with their severity labels
#[derive(Debug, Clone)]
pub struct ErrorTable {
    pub absolute: Array2<f32>,
    pub severity: Array2<Severity>,
    pub counts: SeverityCounts,
}

impl ErrorTable {
    fn new(estimates: &Array2<f32>, truth: &Array2<f32>, ranking: &Ranking) -> Result<Self> {
        let absolute = ranking.reorder(&absolute_error(estimates, truth)?)?;
        let severity = classify_matrix(&absolute);
        let counts = SeverityCounts::from_matrix(&severity);
        Ok(ErrorTable {
            absolute,
            severity,
            counts,
        })
    }
}

/// Everything written for one (proportion, epoch)
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub user_ids: Vec<UserId>,
    pub ranking: Ranking,
    /// Predictions, reordered (descending per row)
    pub estimates: Array2<f32>,
    /// True ratings, reordered
    pub truth: Array2<f32>,
    pub model: ErrorTable,
    pub uniform: ErrorTable,
    pub user_average: ErrorTable,
    pub total_average: ErrorTable,
}

impl ComparisonReport {
    /// Build from matrices sharing the canonical user row order
    pub fn build(
        user_ids: &[UserId],
        predictions: &Array2<f32>,
        truth: &Array2<f32>,
        baselines: &Baselines,
    ) -> Result<Self> {
        if user_ids.len() != predictions.nrows() {
            return Err(JesterError::DataIntegrity(format!(
                "{} user IDs for {} prediction rows",
                user_ids.len(),
                predictions.nrows()
            )));
        }

        let ranking = Ranking::from_predictions(predictions);
        let model = ErrorTable::new(predictions, truth, &ranking)?;

        Ok(ComparisonReport {
            user_ids: user_ids.to_vec(),
            estimates: ranking.reorder(predictions)?,
            truth: ranking.reorder(truth)?,
            model,
            uniform: ErrorTable::new(&baselines.uniform, truth, &ranking)?,
            user_average: ErrorTable::new(&baselines.user_average, truth, &ranking)?,
            total_average: ErrorTable::new(&baselines.total_average, truth, &ranking)?,
            ranking,
        })
    }

    /// Estimator name and error table, model first
    pub fn tables(&self) -> [(&'static str, &ErrorTable); 4] {
        [
            ("mlp", &self.model),
            ("unif", &self.uniform),
            ("uavg", &self.user_average),
            ("tavg", &self.total_average),
        ]
    }

    /// Write all report CSVs into `dir`, creating it if needed
    pub fn write(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let ids = &self.user_ids;

        write_table(&dir.join("recommendation.csv"), ids, &self.ranking.item_ids())?;
        write_table(&dir.join("EST_mlp.csv"), ids, &self.estimates)?;
        write_table(&dir.join("TRUE_mlp.csv"), ids, &self.truth)?;
        for (name, table) in self.tables() {
            write_table(&dir.join(format!("AE_{}.csv", name)), ids, &table.absolute)?;
            write_table(&dir.join(format!("TCV_{}.csv", name)), ids, &table.severity)?;
        }

        log::info!("Report written to {}", dir.display());
        Ok(())
    }
}

/// `<output_dir>/<p>_<epoch>`
pub fn report_dir(output_dir: &str, proportion: Proportion, epoch: usize) -> PathBuf {
    Path::new(output_dir).join(format!("{}_{}", proportion, epoch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scenario() -> ComparisonReport {
        let predictions = array![
            [1.0, 4.0, -2.0, 4.0],
            [0.0, -1.0, 5.0, 2.0],
            [-3.0, -3.0, -3.0, 7.0]
        ];
        let truth = array![
            [5.0, -4.0, -2.0, 0.0],
            [0.0, 2.0, -1.5, 2.0],
            [-3.0, 3.0, -1.0, 1.0]
        ];
        let baselines = Baselines {
            uniform: Array2::zeros((3, 4)),
            user_average: Array2::from_elem((3, 4), 1.0),
            total_average: Array2::from_elem((3, 4), -1.0),
        };
        ComparisonReport::build(&[11, 12, 13], &predictions, &truth, &baselines).unwrap()
    }

    #[test]
    fn test_end_to_end_tables() {
        let report = scenario();

        assert_eq!(
            report.ranking.item_ids(),
            array![[2, 4, 1, 3], [3, 4, 1, 2], [4, 1, 2, 3]]
        );
        assert_eq!(
            report.estimates,
            array![[4.0, 4.0, 1.0, -2.0], [5.0, 2.0, 0.0, -1.0], [7.0, -3.0, -3.0, -3.0]]
        );
        assert_eq!(
            report.truth,
            array![[-4.0, 0.0, 5.0, -2.0], [-1.5, 2.0, 0.0, 2.0], [1.0, -3.0, 3.0, -1.0]]
        );
        assert_eq!(
            report.model.absolute,
            array![[8.0, 4.0, 4.0, 0.0], [6.5, 0.0, 0.0, 3.0], [6.0, 0.0, 6.0, 2.0]]
        );
        assert_eq!(
            report.model.counts,
            SeverityCounts {
                low: 5,
                medium: 3,
                high: 4
            }
        );
    }

    #[test]
    fn test_baselines_follow_model_ranking() {
        let report = scenario();
        // Uniform baseline predicts zero, so its error is |truth| in model order
        assert_eq!(report.uniform.absolute, report.truth.mapv(f32::abs));
        assert_eq!(report.uniform.severity[[0, 2]], Severity::Medium);
        assert_eq!(report.total_average.absolute[[0, 0]], 3.0);
    }

    #[test]
    fn test_write_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = report_dir(dir.path().to_str().unwrap(), Proportion::Sixty, 4);
        scenario().write(&out).unwrap();

        for name in [
            "recommendation", "EST_mlp", "TRUE_mlp", "AE_mlp", "TCV_mlp", "AE_unif", "AE_uavg",
            "AE_tavg", "TCV_unif", "TCV_uavg", "TCV_tavg",
        ] {
            assert!(out.join(format!("{}.csv", name)).exists(), "{}", name);
        }

        let rec = std::fs::read_to_string(out.join("recommendation.csv")).unwrap();
        assert_eq!(rec.lines().next(), Some("uID,rec1,rec2,rec3,rec4"));
        assert_eq!(rec.lines().nth(1), Some("11,2,4,1,3"));

        let tcv = std::fs::read_to_string(out.join("TCV_mlp.csv")).unwrap();
        assert_eq!(tcv.lines().nth(3), Some("13,c,a,c,a"));
        assert!(out.ends_with("60_4"));
    }

    #[test]
    fn test_shape_mismatch() {
        let baselines = Baselines {
            uniform: Array2::zeros((1, 2)),
            user_average: Array2::zeros((1, 2)),
            total_average: Array2::zeros((1, 3)),
        };
        let result =
            ComparisonReport::build(&[1], &array![[1.0, 2.0]], &array![[0.0, 0.0]], &baselines);
        assert!(result.is_err());
    }
}
