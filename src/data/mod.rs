//! Data loading and persistence
//!
//! Rating tables, pair files, comparison tables, mini-batch indexing and the
//! JSON artifacts shared between training and reporting.

pub mod artifacts;
pub mod dataset;
pub mod indexer;
pub mod pairs;
pub mod tables;

pub use artifacts::{ArtifactKey, ExperimentArtifacts};
pub use dataset::{RatingBatch, RatingBatcher, RatingDataset, RatingShift};
pub use indexer::BatchIndexer;
pub use pairs::PairSplit;
pub use tables::{Baselines, UserMatrix};
