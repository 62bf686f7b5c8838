//! Model training
//!
//! Per-pair training loop, estimate capture and multi-pair experiments.

pub mod aggregator;
pub mod experiment;
pub mod metrics;
pub mod trainer;

pub use aggregator::{
    EpochEnd, EpochEndHook, ErrorCurves, EstimateAggregator, EstimateTriple, PairLayout,
    TripleBuffer,
};
pub use experiment::{ExperimentOutcome, ExperimentRunner, ExperimentSpec};
pub use metrics::{Metrics, TrainingHistory};
pub use trainer::NcfTrainer;
