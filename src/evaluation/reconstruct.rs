//! Dense prediction matrices from flattened epoch buffers
//!
//! Rows follow the ascending order of validation user IDs taken from epoch 0;
//! column `j` holds item `j + 1`. Every (user, item) cell must be produced by
//! exactly one buffer row.

use std::collections::{BTreeSet, HashMap};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::training::aggregator::TripleBuffer;
use crate::{JesterError, Result, UserId};

/// Per-epoch prediction matrices sharing one canonical user order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochEstimates {
    /// Row order of every matrix, ascending
    pub user_ids: Vec<UserId>,
    /// One [users, items] matrix per epoch
    pub matrices: Vec<Array2<f32>>,
}

impl EpochEstimates {
    pub fn epoch(&self, epoch: usize) -> Result<&Array2<f32>> {
        self.matrices.get(epoch).ok_or_else(|| {
            JesterError::DataIntegrity(format!(
                "Epoch {} not in {} stored matrices",
                epoch,
                self.matrices.len()
            ))
        })
    }
}

/// Distinct users of a fully written buffer, ascending
pub fn canonical_users(buffer: &TripleBuffer) -> Result<Vec<UserId>> {
    let missing = buffer.len() - buffer.filled();
    if missing > 0 {
        return Err(JesterError::MissingCells {
            epoch: buffer.epoch(),
            count: missing,
        });
    }

    Ok(buffer
        .cells()
        .iter()
        .flatten()
        .map(|t| t.user)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect())
}

/// Maps flattened triples onto a fixed users x items grid
#[derive(Debug, Clone)]
pub struct Reconstructor {
    user_ids: Vec<UserId>,
    ranks: HashMap<UserId, usize>,
    n_items: usize,
}

impl Reconstructor {
    /// `user_ids` must be strictly ascending
    pub fn new(user_ids: Vec<UserId>, n_items: usize) -> Result<Self> {
        if user_ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(JesterError::DataIntegrity(
                "Canonical user IDs must be sorted and distinct".to_string(),
            ));
        }

        let ranks = user_ids
            .iter()
            .enumerate()
            .map(|(rank, &user)| (user, rank))
            .collect();

        Ok(Reconstructor {
            user_ids,
            ranks,
            n_items,
        })
    }

    pub fn user_ids(&self) -> &[UserId] {
        &self.user_ids
    }

    /// Build the [users, items] matrix for one epoch
    pub fn reconstruct(&self, buffer: &TripleBuffer) -> Result<Array2<f32>> {
        let epoch = buffer.epoch();
        let users = canonical_users(buffer)?;
        if users != self.user_ids {
            return Err(JesterError::UserSetMismatch { epoch });
        }

        let shape = (self.user_ids.len(), self.n_items);
        let mut matrix = Array2::<f32>::zeros(shape);
        let mut fills = Array2::<u32>::zeros(shape);

        for triple in buffer.cells().iter().flatten() {
            let rank = *self
                .ranks
                .get(&triple.user)
                .ok_or(JesterError::UserSetMismatch { epoch })?;
            if triple.item < 1 || triple.item as usize > self.n_items {
                return Err(JesterError::DataIntegrity(format!(
                    "Item {} outside 1..={}",
                    triple.item, self.n_items
                )));
            }
            let col = triple.item as usize - 1;

            if fills[[rank, col]] > 0 {
                return Err(JesterError::DuplicateCell {
                    user: triple.user,
                    item: triple.item,
                });
            }
            fills[[rank, col]] += 1;
            matrix[[rank, col]] = triple.prediction;
        }

        let unfilled = fills.iter().filter(|&&n| n == 0).count();
        if unfilled > 0 {
            return Err(JesterError::MissingCells {
                epoch,
                count: unfilled,
            });
        }

        Ok(matrix)
    }
}

/// Reconstruct every epoch, with the user order fixed by epoch 0
pub fn reconstruct_epochs(buffers: &[TripleBuffer], n_items: usize) -> Result<EpochEstimates> {
    let first = buffers
        .first()
        .ok_or_else(|| JesterError::DataIntegrity("No epoch buffers to reconstruct".to_string()))?;
    let reconstructor = Reconstructor::new(canonical_users(first)?, n_items)?;

    let matrices = buffers
        .iter()
        .map(|buffer| reconstructor.reconstruct(buffer))
        .collect::<Result<Vec<_>>>()?;

    log::info!(
        "Reconstructed {} epochs of {} users x {} items",
        matrices.len(),
        reconstructor.user_ids().len(),
        n_items
    );

    Ok(EpochEstimates {
        user_ids: reconstructor.user_ids.clone(),
        matrices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::aggregator::EstimateTriple;
    use ndarray::array;

    /// Flatten a matrix in reverse row-major order
    fn flatten(epoch: usize, users: &[UserId], matrix: &Array2<f32>) -> TripleBuffer {
        let mut triples = Vec::new();
        for (rank, &user) in users.iter().enumerate() {
            for col in 0..matrix.ncols() {
                triples.push(EstimateTriple {
                    user,
                    item: col as i64 + 1,
                    prediction: matrix[[rank, col]],
                });
            }
        }
        triples.reverse();
        TripleBuffer::from_triples(epoch, triples)
    }

    #[test]
    fn test_round_trip() {
        let users = vec![2, 15, 40];
        let matrix = array![
            [1.0, -2.5, 3.0, 0.0],
            [4.5, 5.0, -6.0, 7.25],
            [8.0, 9.0, 10.0, -0.5]
        ];
        let buffer = flatten(0, &users, &matrix);

        let estimates = reconstruct_epochs(&[buffer], 4).unwrap();
        assert_eq!(estimates.user_ids, users);
        assert_eq!(estimates.matrices[0], matrix);
    }

    #[test]
    fn test_duplicate_cell_detected() {
        let triple = |item, prediction| EstimateTriple {
            user: 1,
            item,
            prediction,
        };
        let buffer = TripleBuffer::from_triples(0, vec![triple(1, 0.5), triple(1, 0.7)]);
        let reconstructor = Reconstructor::new(vec![1], 2).unwrap();
        assert!(matches!(
            reconstructor.reconstruct(&buffer),
            Err(JesterError::DuplicateCell { user: 1, item: 1 })
        ));
    }

    #[test]
    fn test_missing_cell_detected() {
        let users = vec![1, 2];
        let matrix = array![[1.0, 2.0], [3.0, 4.0]];
        let full = flatten(0, &users, &matrix);

        // Drop one triple: user 2 still present through its other item
        let mut triples: Vec<EstimateTriple> = full.cells().iter().flatten().copied().collect();
        triples.retain(|t| !(t.user == 2 && t.item == 1));
        let partial = TripleBuffer::from_triples(1, triples);

        let reconstructor = Reconstructor::new(users, 2).unwrap();
        assert!(matches!(
            reconstructor.reconstruct(&partial),
            Err(JesterError::MissingCells { epoch: 1, count: 1 })
        ));
    }

    #[test]
    fn test_unwritten_slot_detected() {
        let buffer = TripleBuffer::new(4, 3);
        assert!(matches!(
            canonical_users(&buffer),
            Err(JesterError::MissingCells { epoch: 4, count: 3 })
        ));
    }

    #[test]
    fn test_user_set_mismatch() {
        let matrix = array![[1.0], [2.0]];
        let epoch0 = flatten(0, &[1, 2], &matrix);
        let epoch1 = flatten(1, &[1, 3], &matrix);

        assert!(matches!(
            reconstruct_epochs(&[epoch0, epoch1], 1),
            Err(JesterError::UserSetMismatch { epoch: 1 })
        ));
    }

    #[test]
    fn test_item_out_of_range() {
        let buffer = TripleBuffer::from_triples(
            0,
            vec![EstimateTriple {
                user: 1,
                item: 3,
                prediction: 0.0,
            }],
        );
        let reconstructor = Reconstructor::new(vec![1], 2).unwrap();
        assert!(matches!(
            reconstructor.reconstruct(&buffer),
            Err(JesterError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_unsorted_users_rejected() {
        assert!(Reconstructor::new(vec![3, 1], 2).is_err());
        assert!(Reconstructor::new(vec![1, 1], 2).is_err());
    }
}
