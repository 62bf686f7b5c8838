//! One full experiment: every pair of a proportion, trained in order
//!
//! Pairs share one `EstimateAggregator`; each pair writes only its own row
//! range. After the last pair, every epoch's buffer is turned into a
//! prediction matrix.

use std::path::Path;

use burn::tensor::backend::AutodiffBackend;

use crate::data::artifacts::{ArtifactKey, ExperimentArtifacts};
use crate::data::pairs::PairSplit;
use crate::evaluation::reconstruct::reconstruct_epochs;
use crate::model::{NcfConfig, NcfModel};
use crate::training::aggregator::{EstimateAggregator, PairLayout};
use crate::training::metrics::TrainingHistory;
use crate::training::trainer::NcfTrainer;
use crate::{Config, JesterError, Proportion, Result};

/// Settings for one run, already merged from config and CLI
#[derive(Debug, Clone)]
pub struct ExperimentSpec {
    pub proportion: Proportion,
    pub epochs: usize,
    pub seed: u64,
}

/// Result of a finished run
#[derive(Debug)]
pub struct ExperimentOutcome {
    pub key: ArtifactKey,
    pub artifacts: ExperimentArtifacts,
    pub histories: Vec<TrainingHistory>,
}

/// Trains all pairs of an experiment
pub struct ExperimentRunner<B: AutodiffBackend> {
    config: Config,
    device: B::Device,
}

impl<B: AutodiffBackend> ExperimentRunner<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    pub fn new(config: Config, device: B::Device) -> Self {
        ExperimentRunner { config, device }
    }

    /// Train every pair and reconstruct per-epoch prediction matrices
    pub fn run(&self, spec: &ExperimentSpec, pairs: &[PairSplit]) -> Result<ExperimentOutcome> {
        if pairs.len() != spec.proportion.pair_count() {
            return Err(JesterError::DataIntegrity(format!(
                "Proportion {} needs {} pairs, got {}",
                spec.proportion,
                spec.proportion.pair_count(),
                pairs.len()
            )));
        }
        if spec.epochs == 0 {
            return Err(JesterError::Config("epochs must be positive".to_string()));
        }

        let key = ArtifactKey::now(spec.proportion, spec.epochs);
        let sizes: Vec<usize> = pairs.iter().map(|p| p.validation.len()).collect();
        let layout = PairLayout::new(&sizes);
        let mut aggregator = EstimateAggregator::new(layout.clone(), spec.epochs)?;

        log::info!(
            "Run {}: proportion {}, {} pairs, {} epochs, {} validation rows",
            key.run_id,
            spec.proportion,
            pairs.len(),
            spec.epochs,
            layout.total_rows()
        );
        log::info!("Training: {:?}", self.config.training);
        log::info!("Model: {:?}", self.config.model);

        let mut histories = Vec::with_capacity(pairs.len());
        for (index, pair) in pairs.iter().enumerate() {
            if pair.index != index {
                return Err(JesterError::DataIntegrity(format!(
                    "Pair at position {} claims index {}",
                    index, pair.index
                )));
            }
            let row_offset = layout.offset(index).ok_or_else(|| {
                JesterError::DataIntegrity(format!("No row range for pair {}", index))
            })?;

            let pair_seed = spec.seed.wrapping_add(index as u64);
            // Process-global: weight init for this pair draws from it
            B::seed(pair_seed);

            let (n_users, n_items) = pair.id_bounds();
            let ncf_config = NcfConfig::new(&self.config.model, n_users, n_items);
            let model = NcfModel::<B>::new(&self.device, &ncf_config);
            let trainer = NcfTrainer::new(
                model,
                ncf_config,
                self.config.training.clone(),
                self.device.clone(),
            );

            let (model, history) =
                trainer.train(pair, row_offset, spec.epochs, pair_seed, &mut aggregator)?;

            log::info!(
                "Pair {} done: best validation MAE {:.4} at epoch {}",
                index + 1,
                history.best_val_mae,
                history.best_epoch + 1
            );

            if self.config.data.save_models {
                let path = model_path(Path::new(&self.config.data.model_dir), &key, index);
                std::fs::create_dir_all(&self.config.data.model_dir)?;
                model.save(&path)?;
                log::info!("Saved pair {} model to {}", index + 1, path);
            }
            histories.push(history);
        }

        let (buffers, curves) = aggregator.into_parts();
        if !curves.is_complete() {
            return Err(JesterError::DataIntegrity(
                "Error curves incomplete after training".to_string(),
            ));
        }
        let estimates = reconstruct_epochs(&buffers, self.config.data.n_items)?;
        let (train_curve, val_curve) = curves.into_arrays();

        Ok(ExperimentOutcome {
            key,
            artifacts: ExperimentArtifacts {
                estimates,
                train_curve,
                val_curve,
            },
            histories,
        })
    }
}

/// Saved model location for a pair, without the recorder's extension
pub fn model_path(dir: &Path, key: &ArtifactKey, pair_index: usize) -> String {
    dir.join(format!(
        "{}_{}_{}",
        key.proportion.percent(),
        pair_index + 1,
        key.run_id
    ))
    .display()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::RatingDataset;
    use crate::RatingRecord;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    /// Two pairs over 4 users x 3 items; validation users split by pair
    fn synthetic_pairs() -> Vec<PairSplit> {
        (0..2)
            .map(|index| {
                let mut train = Vec::new();
                let mut validation = Vec::new();
                for user in 1..=4i64 {
                    for item in 1..=3i64 {
                        let record = RatingRecord::new(user, item, (user - item) as f32);
                        // Pair 0 validates users 1-2, pair 1 users 3-4
                        let validates = (user - 1) / 2 == index as i64;
                        if validates {
                            validation.push(record);
                        } else {
                            train.push(record);
                        }
                        train.push(RatingRecord::new(user + 4, item, 0.5));
                    }
                }
                PairSplit {
                    index,
                    train: RatingDataset::new(train),
                    validation: RatingDataset::new(validation),
                }
            })
            .collect()
    }

    #[test]
    fn test_run_reconstructs_every_epoch() {
        let mut config = Config::default();
        config.data.n_items = 3;
        config.training.batch_size = 4;
        config.training.learning_rate = 0.01;
        config.model.hidden_dims = vec![4];

        let runner = ExperimentRunner::<TestBackend>::new(config, Default::default());
        let spec = ExperimentSpec {
            proportion: Proportion::Thirty,
            epochs: 2,
            seed: 9999,
        };
        let outcome = runner.run(&spec, &synthetic_pairs()).unwrap();

        let estimates = &outcome.artifacts.estimates;
        assert_eq!(estimates.user_ids, vec![1, 2, 3, 4]);
        assert_eq!(estimates.matrices.len(), 2);
        assert_eq!(estimates.matrices[0].dim(), (4, 3));
        assert_eq!(outcome.artifacts.val_curve.dim(), (2, 2));
        assert_eq!(outcome.histories.len(), 2);
    }

    #[test]
    fn test_run_rejects_wrong_pair_count() {
        let runner = ExperimentRunner::<TestBackend>::new(Config::default(), Default::default());
        let spec = ExperimentSpec {
            proportion: Proportion::Sixty,
            epochs: 1,
            seed: 1,
        };
        assert!(matches!(
            runner.run(&spec, &synthetic_pairs()),
            Err(JesterError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_model_path() {
        let key = ArtifactKey::new(Proportion::Ninety, 150, "ff");
        assert_eq!(model_path(Path::new("model"), &key, 0), "model/90_1_ff");
    }
}
