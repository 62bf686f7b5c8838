//! Neural network architecture
//!
//! The rating predictor is a neural collaborative filtering network over
//! user and joke ID embeddings.

pub mod ncf;

pub use ncf::{NcfConfig, NcfModel, NcfPredictor};

use crate::{ItemId, Result, UserId};

/// Anything that can score (user, item) pairs
pub trait Predictor {
    /// One predicted rating per (users[i], items[i])
    fn predict(&self, users: &[UserId], items: &[ItemId]) -> Result<Vec<f32>>;
}
