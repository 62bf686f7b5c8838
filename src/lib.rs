//! Jester joke rating prediction using neural collaborative filtering
//!
//! Trains an embedding + dense network on categorical user/joke IDs across
//! several independent train/validation pairs, picks the best epoch by
//! sample-weighted validation error, and writes comparison reports against
//! baseline estimators.

pub mod data;
pub mod evaluation;
pub mod model;
pub mod report;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for a user
pub type UserId = i64;

/// Unique identifier for a joke (1-based)
pub type ItemId = i64;

/// A single observed rating
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    #[serde(rename = "uID")]
    pub user: UserId,
    #[serde(rename = "jID")]
    pub item: ItemId,
    pub rating: f32,
}

impl RatingRecord {
    pub fn new(user: UserId, item: ItemId, rating: f32) -> Self {
        RatingRecord { user, item, rating }
    }
}

/// Fraction of the data used for training in an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Proportion {
    Thirty,
    Sixty,
    Ninety,
}

impl Proportion {
    pub const ALL: [Proportion; 3] = [Proportion::Thirty, Proportion::Sixty, Proportion::Ninety];

    /// Parse a percentage selector, failing for anything but 30, 60 or 90
    pub fn from_percent(percent: u32) -> Result<Self> {
        match percent {
            30 => Ok(Proportion::Thirty),
            60 => Ok(Proportion::Sixty),
            90 => Ok(Proportion::Ninety),
            other => Err(JesterError::Config(format!(
                "Unsupported proportion {}: expected one of 30, 60, 90",
                other
            ))),
        }
    }

    pub fn percent(&self) -> u32 {
        match self {
            Proportion::Thirty => 30,
            Proportion::Sixty => 60,
            Proportion::Ninety => 90,
        }
    }

    /// Number of validation ratings contributed by each pair, in pair order
    pub fn rating_counts(&self) -> &'static [usize] {
        match self {
            Proportion::Thirty => &[21000, 9000],
            Proportion::Sixty => &[9900, 10200, 9900],
            Proportion::Ninety => &[
                2400, 2700, 2700, 2700, 2700, 2400, 2400, 2400, 2400, 2400, 2400, 2400,
            ],
        }
    }

    pub fn pair_count(&self) -> usize {
        self.rating_counts().len()
    }
}

impl fmt::Display for Proportion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.percent())
    }
}

impl FromStr for Proportion {
    type Err = JesterError;

    fn from_str(s: &str) -> Result<Self> {
        let percent = s
            .trim()
            .trim_end_matches('%')
            .parse::<u32>()
            .map_err(|_| JesterError::Config(format!("Invalid proportion: {}", s)))?;
        Proportion::from_percent(percent)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum JesterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Triple buffer cell already written: epoch {epoch}, row {row}")]
    DuplicateWrite { epoch: usize, row: usize },

    #[error("Prediction for user {user}, item {item} appears more than once")]
    DuplicateCell { user: UserId, item: ItemId },

    #[error("Epoch {epoch} has {count} unfilled prediction cells")]
    MissingCells { epoch: usize, count: usize },

    #[error("Validation users of epoch {epoch} differ from epoch 0")]
    UserSetMismatch { epoch: usize },

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Artifact error for {path}: {message}")]
    Artifact { path: String, message: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JesterError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub data: DataConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Per-step learning rate decay: lr / (1 + decay * step)
    pub lr_decay: f64,
    pub weight_decay: f64,
    pub shuffle: bool,
    pub seed: u64,
    /// Rows per forward pass when predicting validation sets
    pub eval_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub user_embedding_dim: usize,
    pub item_embedding_dim: usize,
    pub hidden_dims: Vec<usize>,
    pub batch_norm: bool,
    /// Dropout after each hidden layer, 0.0 disables it
    pub dropout: f64,
    pub leaky_relu_slope: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding `<p>_<i>_train.csv` / `<p>_<i>_test.csv` pair files
    pub pairs_dir: String,
    /// Offset added to ratings in the pair files
    pub rating_offset: f32,
    /// Number of distinct jokes
    pub n_items: usize,
    pub testing_path: String,
    pub uniform_path: String,
    pub user_avg_path: String,
    pub total_avg_path: String,
    pub artifact_dir: String,
    pub model_dir: String,
    pub save_models: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            training: TrainingConfig {
                epochs: 150,
                batch_size: 4096,
                learning_rate: 0.1,
                lr_decay: 1e-3,
                weight_decay: 0.0,
                shuffle: true,
                seed: 9999,
                eval_batch_size: 8192,
            },
            model: ModelConfig {
                user_embedding_dim: 16,
                item_embedding_dim: 3,
                hidden_dims: vec![200, 100],
                batch_norm: true,
                dropout: 0.0,
                leaky_relu_slope: 0.3,
            },
            data: DataConfig {
                pairs_dir: "cvout".to_string(),
                rating_offset: 10.0,
                n_items: 100,
                testing_path: "data/jester-data-testing.csv".to_string(),
                uniform_path: "data/compare_uniform.csv".to_string(),
                user_avg_path: "data/compare_userAVG.csv".to_string(),
                total_avg_path: "data/compare_totalAVG.csv".to_string(),
                artifact_dir: "artifacts".to_string(),
                model_dir: "model".to_string(),
                save_models: false,
            },
            report: ReportConfig {
                output_dir: "output".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            JesterError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| JesterError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| JesterError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would make training or reporting meaningless
    pub fn validate(&self) -> Result<()> {
        if self.training.batch_size == 0 {
            return Err(JesterError::Config("batch_size must be positive".to_string()));
        }
        if self.training.eval_batch_size == 0 {
            return Err(JesterError::Config(
                "eval_batch_size must be positive".to_string(),
            ));
        }
        if self.data.n_items == 0 {
            return Err(JesterError::Config("n_items must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(JesterError::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.model.dropout
            )));
        }
        Ok(())
    }
}
