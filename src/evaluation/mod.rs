//! Post-training evaluation
//!
//! Rebuilds prediction matrices from epoch buffers, selects the optimal
//! epoch and summarises error curves.

pub mod curves;
pub mod reconstruct;
pub mod selector;

pub use curves::{summarize, CurvePoint};
pub use reconstruct::{reconstruct_epochs, EpochEstimates, Reconstructor};
pub use selector::{select_epoch, EpochSelection};
