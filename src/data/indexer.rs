//! Mini-batch index partitions over a rating table
//!
//! Only full batches are served: the `N mod B` trailing rows of each epoch's
//! permutation are dropped.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::{JesterError, Result};

/// Produces per-epoch permutations of `[0, N)` and slices them into batches
///
/// Holds the only mutable state of the batching pipeline, so it must be
/// owned by a single training loop.
#[derive(Debug)]
pub struct BatchIndexer {
    indexes: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl BatchIndexer {
    /// Create an indexer for `n_rows` rows, seeded for reproducible shuffles
    pub fn new(n_rows: usize, batch_size: usize, shuffle: bool, seed: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(JesterError::Config("batch_size must be positive".to_string()));
        }

        let mut indexer = BatchIndexer {
            indexes: Vec::with_capacity(n_rows),
            batch_size,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
        };
        indexer.indexes.extend(0..n_rows);
        indexer.start_epoch();
        Ok(indexer)
    }

    /// Regenerate the permutation (fresh shuffle, or identity)
    pub fn start_epoch(&mut self) {
        let n_rows = self.indexes.len();
        self.indexes.clear();
        self.indexes.extend(0..n_rows);
        if self.shuffle {
            self.indexes.shuffle(&mut self.rng);
        }
    }

    /// Number of full batches per epoch: floor(N / B)
    pub fn batch_count(&self) -> usize {
        self.indexes.len() / self.batch_size
    }

    /// Row indexes for batch `index`, or None past the last full batch
    pub fn batch(&self, index: usize) -> Option<&[usize]> {
        if index >= self.batch_count() {
            return None;
        }
        let start = index * self.batch_size;
        Some(&self.indexes[start..start + self.batch_size])
    }

    /// Rows skipped every epoch because they do not fill a batch
    pub fn dropped_rows(&self) -> usize {
        self.indexes.len() - self.batch_count() * self.batch_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
