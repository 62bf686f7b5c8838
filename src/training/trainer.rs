//! Training loop for the NCF model
//!
//! One trainer trains one pair. Batches come from a `BatchIndexer` (full
//! batches only), the loss is MSE, and at every epoch end the validation set
//! is scored and handed to the injected `EpochEndHook`.

use burn::data::dataloader::batcher::Batcher;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;

use crate::data::dataset::{RatingBatcher, RatingDataset};
use crate::data::indexer::BatchIndexer;
use crate::data::pairs::PairSplit;
use crate::model::{NcfConfig, NcfModel, NcfPredictor, Predictor};
use crate::training::aggregator::{EpochEnd, EpochEndHook};
use crate::training::metrics::{Metrics, TrainingHistory};
use crate::{ItemId, RatingRecord, Result, TrainingConfig, UserId};

/// Trainer for the NCF model
pub struct NcfTrainer<B: AutodiffBackend> {
    model: NcfModel<B>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Adam, NcfModel<B>, B>,
    ncf_config: NcfConfig,
    config: TrainingConfig,
    device: B::Device,
    /// Optimizer steps taken, drives learning rate decay
    step: usize,
}

impl<B: AutodiffBackend> NcfTrainer<B> {
    /// Create a new trainer
    pub fn new(
        model: NcfModel<B>,
        ncf_config: NcfConfig,
        config: TrainingConfig,
        device: B::Device,
    ) -> Self {
        let weight_decay = (config.weight_decay > 0.0)
            .then(|| WeightDecayConfig::new(config.weight_decay as f32));
        let optimizer = AdamConfig::new().with_weight_decay(weight_decay).init();

        NcfTrainer {
            model,
            optimizer,
            ncf_config,
            config,
            device,
            step: 0,
        }
    }

    /// Learning rate for the next step: lr / (1 + decay * step)
    pub fn current_learning_rate(&self) -> f64 {
        self.config.learning_rate / (1.0 + self.config.lr_decay * self.step as f64)
    }

    /// Train on one pair for `epochs` epochs
    ///
    /// `row_offset` is the pair's first row in the hook's buffers; `seed`
    /// drives the batch shuffles.
    pub fn train(
        mut self,
        pair: &PairSplit,
        row_offset: usize,
        epochs: usize,
        seed: u64,
        hook: &mut dyn EpochEndHook,
    ) -> Result<(NcfModel<B>, TrainingHistory)> {
        let mut indexer = BatchIndexer::new(
            pair.train.len(),
            self.config.batch_size,
            self.config.shuffle,
            seed,
        )?;
        if indexer.batch_count() == 0 {
            log::warn!(
                "Pair {}: {} training rows do not fill a batch of {}; weights will not update",
                pair.index + 1,
                pair.train.len(),
                self.config.batch_size
            );
        } else if indexer.dropped_rows() > 0 {
            log::debug!(
                "Pair {}: {} trailing rows dropped each epoch",
                pair.index + 1,
                indexer.dropped_rows()
            );
        }

        let batcher = RatingBatcher::<B>::new(self.device.clone());
        let validation = pair.validation.records();
        let val_users = pair.validation.user_ids();
        let val_items = pair.validation.item_ids();
        let val_targets = pair.validation.ratings();

        let mut history = TrainingHistory::new();

        log::info!(
            "Training pair {} for {} epochs ({} batches of {})",
            pair.index + 1,
            epochs,
            indexer.batch_count(),
            self.config.batch_size
        );

        for epoch in 0..epochs {
            if epoch > 0 {
                indexer.start_epoch();
            }

            // Training phase
            let train_metrics = self.train_epoch(&indexer, &pair.train, &batcher);

            // Validation phase on the inference copy of the model
            let eval_model = self.model.valid();
            let predictor = NcfPredictor::new(
                &eval_model,
                &self.ncf_config,
                self.device.clone(),
                self.config.eval_batch_size,
            );
            let val_predictions = predictor.predict(&val_users, &val_items)?;
            let val_metrics = Metrics::from_predictions(&val_predictions, &val_targets);

            history.record_epoch(epoch, &train_metrics, &val_metrics);

            log::info!(
                "Pair {} epoch {}/{}: Train: {} | Val: {} | lr {:.5}",
                pair.index + 1,
                epoch + 1,
                epochs,
                train_metrics,
                val_metrics,
                self.current_learning_rate()
            );

            hook.on_epoch_end(
                &EpochEnd {
                    epoch,
                    pair_index: pair.index,
                    row_offset,
                    validation,
                    training_error: train_metrics.mae(),
                    validation_error: val_metrics.mae(),
                },
                &ScoredInputs {
                    users: &val_users,
                    items: &val_items,
                    predictions: &val_predictions,
                    model: &predictor,
                },
            )?;
        }

        Ok((self.model, history))
    }

    /// Train one epoch over the indexer's current permutation
    fn train_epoch(
        &mut self,
        indexer: &BatchIndexer,
        dataset: &RatingDataset,
        batcher: &RatingBatcher<B>,
    ) -> Metrics {
        let mut metrics = Metrics::new();
        let records = dataset.records();

        for index in 0..indexer.batch_count() {
            let Some(rows) = indexer.batch(index) else {
                break;
            };
            let items: Vec<RatingRecord> = rows
                .iter()
                .filter_map(|&row| records.get(row).copied())
                .collect();
            let batch_size = items.len();
            let batch = batcher.batch(items, &self.device);

            // Forward pass
            let predictions = self.model.forward(batch.users.clone(), batch.items.clone());
            let residual = predictions - batch.ratings.clone();

            // Mean squared error
            let loss = residual.clone().powf_scalar(2.0).mean();
            let loss_val: f32 = loss.clone().into_scalar().elem();
            let abs_error_sum: f32 = residual.detach().abs().sum().into_scalar().elem();

            // Backward pass
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);

            // Update weights
            let learning_rate = self.current_learning_rate();
            self.model = self.optimizer.step(learning_rate, self.model.clone(), grads);
            self.step += 1;

            metrics.update(loss_val, abs_error_sum as f64, batch_size);
        }

        metrics
    }

    /// Get the current model
    pub fn model(&self) -> &NcfModel<B> {
        &self.model
    }
}

/// Serves already computed predictions for one input set, so the epoch-end
/// hook does not score the validation set a second time
struct ScoredInputs<'a> {
    users: &'a [UserId],
    items: &'a [ItemId],
    predictions: &'a [f32],
    model: &'a dyn Predictor,
}

impl Predictor for ScoredInputs<'_> {
    fn predict(&self, users: &[UserId], items: &[ItemId]) -> Result<Vec<f32>> {
        if users == self.users && items == self.items {
            Ok(self.predictions.to_vec())
        } else {
            self.model.predict(users, items)
        }
    }
}
