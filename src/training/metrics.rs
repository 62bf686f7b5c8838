//! Training metrics and evaluation

use std::fmt;

/// Metrics accumulated during training/evaluation
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Sum of batch MSE losses
    pub total_loss: f64,
    /// Sum of absolute errors over all predictions
    pub abs_error_sum: f64,
    /// Total predictions
    pub total_predictions: usize,
    /// Number of batches accumulated
    pub batch_count: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics with a batch result
    pub fn update(&mut self, loss: f32, abs_error_sum: f64, batch_size: usize) {
        self.total_loss += loss as f64;
        self.abs_error_sum += abs_error_sum;
        self.total_predictions += batch_size;
        self.batch_count += 1;
    }

    /// Accumulate a full set of predictions against their targets
    pub fn from_predictions(predictions: &[f32], targets: &[f32]) -> Self {
        let mut metrics = Metrics::new();
        let n = predictions.len().min(targets.len());
        if n == 0 {
            return metrics;
        }
        let (abs_sum, sq_sum) = predictions
            .iter()
            .zip(targets)
            .fold((0.0f64, 0.0f64), |(abs_sum, sq_sum), (p, t)| {
                let diff = (*p - *t) as f64;
                (abs_sum + diff.abs(), sq_sum + diff * diff)
            });
        metrics.update((sq_sum / n as f64) as f32, abs_sum, n);
        metrics
    }

    /// Get average batch loss
    pub fn avg_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_loss / self.batch_count as f64
        }
    }

    /// Mean absolute error over every prediction
    pub fn mae(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.abs_error_sum / self.total_predictions as f64
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSE: {:.4} | MAE: {:.4}", self.avg_loss(), self.mae())
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub train_maes: Vec<f64>,
    pub val_maes: Vec<f64>,
    pub best_val_mae: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_mae: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record metrics for an epoch
    pub fn record_epoch(&mut self, epoch: usize, train: &Metrics, val: &Metrics) {
        self.train_losses.push(train.avg_loss());
        self.train_maes.push(train.mae());
        self.val_maes.push(val.mae());

        if val.mae() < self.best_val_mae {
            self.best_val_mae = val.mae();
            self.best_epoch = epoch;
        }
    }

    pub fn epochs(&self) -> usize {
        self.val_maes.len()
    }
}
