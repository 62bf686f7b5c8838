//! Train/validation pair files for each proportion

use std::path::{Path, PathBuf};

use crate::data::dataset::{RatingDataset, RatingShift};
use crate::{JesterError, Proportion, Result};

/// One independently trained (training, validation) split
#[derive(Debug, Clone)]
pub struct PairSplit {
    /// Position of the pair within its proportion (0-based)
    pub index: usize,
    pub train: RatingDataset,
    pub validation: RatingDataset,
}

impl PairSplit {
    /// Embedding table sizes covering every ID seen in either half
    pub fn id_bounds(&self) -> (usize, usize) {
        let max_user = self
            .train
            .max_user()
            .max(self.validation.max_user())
            .unwrap_or(0);
        let max_item = self
            .train
            .max_item()
            .max(self.validation.max_item())
            .unwrap_or(0);
        (max_user.max(0) as usize + 1, max_item.max(0) as usize + 1)
    }
}

/// File prefix for pair `index` (0-based), e.g. `cvout/60_2`
pub fn pair_prefix(dir: &Path, proportion: Proportion, index: usize) -> PathBuf {
    dir.join(format!("{}_{}", proportion.percent(), index + 1))
}

/// Load a single pair
pub fn load_pair(
    dir: &Path,
    proportion: Proportion,
    index: usize,
    shift: RatingShift,
) -> Result<PairSplit> {
    if index >= proportion.pair_count() {
        return Err(JesterError::Config(format!(
            "Pair {} out of range: proportion {} has {} pairs",
            index + 1,
            proportion,
            proportion.pair_count()
        )));
    }

    let prefix = pair_prefix(dir, proportion, index);
    let train_path = PathBuf::from(format!("{}_train.csv", prefix.display()));
    let test_path = PathBuf::from(format!("{}_test.csv", prefix.display()));

    let train = RatingDataset::from_csv(&train_path, shift)?;
    let validation = RatingDataset::from_csv(&test_path, shift)?;

    log::info!(
        "Pair {}: {} training / {} validation ratings",
        index + 1,
        train.len(),
        validation.len()
    );

    Ok(PairSplit {
        index,
        train,
        validation,
    })
}

/// Load every pair of a proportion, in pair order
pub fn load_pairs(
    dir: &Path,
    proportion: Proportion,
    shift: RatingShift,
) -> Result<Vec<PairSplit>> {
    let pairs = (0..proportion.pair_count())
        .map(|i| load_pair(dir, proportion, i, shift))
        .collect::<Result<Vec<_>>>()?;

    for (pair, &expected) in pairs.iter().zip(proportion.rating_counts()) {
        if pair.validation.len() != expected {
            log::warn!(
                "Pair {} has {} validation ratings, expected {} for proportion {}",
                pair.index + 1,
                pair.validation.len(),
                expected,
                proportion
            );
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(path: &Path, rows: &[(i64, i64, f32)]) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "uID,jID,rating").unwrap();
        for (u, j, r) in rows {
            writeln!(file, "{},{},{}", u, j, r).unwrap();
        }
    }

    #[test]
    fn test_pair_prefix() {
        let prefix = pair_prefix(Path::new("cvout"), Proportion::Ninety, 11);
        assert_eq!(prefix, PathBuf::from("cvout/90_12"));
    }

    #[test]
    fn test_load_pairs() {
        let dir = tempfile::tempdir().unwrap();
        write_table(&dir.path().join("30_1_train.csv"), &[(1, 1, 15.0), (2, 3, 5.0)]);
        write_table(&dir.path().join("30_1_test.csv"), &[(1, 2, 10.0)]);
        write_table(&dir.path().join("30_2_train.csv"), &[(4, 1, 12.0)]);
        write_table(&dir.path().join("30_2_test.csv"), &[(9, 100, 20.0), (4, 2, 0.0)]);

        let pairs = load_pairs(dir.path(), Proportion::Thirty, RatingShift::new(10.0)).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].train.len(), 2);
        assert_eq!(pairs[0].validation.records()[0].rating, 0.0);
        assert_eq!(pairs[1].index, 1);
        assert_eq!(pairs[1].id_bounds(), (10, 101));
    }

    #[test]
    fn test_load_pair_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_pair(dir.path(), Proportion::Thirty, 2, RatingShift::new(10.0));
        assert!(matches!(result, Err(JesterError::Config(_))));
    }
}
