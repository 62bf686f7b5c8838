//! Per-user item rankings and column reordering
//!
//! Items are ranked by descending prediction. The sort is stable over
//! ascending item index, so equal predictions keep ascending item ID order.

use ndarray::Array2;

use crate::{ItemId, JesterError, Result};

/// For each user row, item columns in descending-preference order
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// columns[[u, k]] = column index of the k-th ranked item for user u
    columns: Array2<usize>,
}

impl Ranking {
    /// Rank every row of a [users, items] prediction matrix
    pub fn from_predictions(predictions: &Array2<f32>) -> Self {
        let (users, items) = predictions.dim();
        let mut columns = Array2::<usize>::zeros((users, items));

        for (row, mut out) in predictions.rows().into_iter().zip(columns.rows_mut()) {
            let mut order: Vec<usize> = (0..items).collect();
            order.sort_by(|&a, &b| sort_key(row[b]).total_cmp(&sort_key(row[a])));
            for (slot, col) in out.iter_mut().zip(order) {
                *slot = col;
            }
        }

        Ranking { columns }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.columns.dim()
    }

    /// Ranked 1-based item IDs: [users, items]
    pub fn item_ids(&self) -> Array2<ItemId> {
        self.columns.mapv(|col| col as ItemId + 1)
    }

    /// Permute each row so column k holds the k-th ranked item's value
    pub fn reorder<T: Clone>(&self, values: &Array2<T>) -> Result<Array2<T>> {
        self.check_shape(values.dim())?;
        Ok(Array2::from_shape_fn(self.columns.dim(), |(u, k)| {
            values[[u, self.columns[[u, k]]]].clone()
        }))
    }

    /// Undo `reorder`: column j again holds item j + 1
    pub fn restore<T: Clone>(&self, reordered: &Array2<T>) -> Result<Array2<T>> {
        self.check_shape(reordered.dim())?;
        let mut restored = reordered.clone();
        for ((u, k), &col) in self.columns.indexed_iter() {
            restored[[u, col]] = reordered[[u, k]].clone();
        }
        Ok(restored)
    }

    fn check_shape(&self, dim: (usize, usize)) -> Result<()> {
        if dim != self.columns.dim() {
            return Err(JesterError::DataIntegrity(format!(
                "Matrix shaped {:?} does not match ranking {:?}",
                dim,
                self.columns.dim()
            )));
        }
        Ok(())
    }
}

/// `total_cmp` key with -0.0 folded into 0.0
fn sort_key(value: f32) -> f32 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}

/// Rebuild one unordered row from a reordered row and its 1-based ranked IDs
pub fn restore_order<T: Clone>(reordered: &[T], ranked_ids: &[ItemId]) -> Result<Vec<T>> {
    if reordered.len() != ranked_ids.len() {
        return Err(JesterError::DataIntegrity(format!(
            "{} values for a ranking of {} items",
            reordered.len(),
            ranked_ids.len()
        )));
    }

    let mut slots: Vec<Option<T>> = vec![None; reordered.len()];
    for (value, &id) in reordered.iter().zip(ranked_ids) {
        let slot = usize::try_from(id - 1)
            .ok()
            .and_then(|col| slots.get_mut(col))
            .ok_or_else(|| JesterError::DataIntegrity(format!("Item {} out of range", id)))?;
        if slot.replace(value.clone()).is_some() {
            return Err(JesterError::DataIntegrity(format!(
                "Item {} ranked twice",
                id
            )));
        }
    }
    // Lengths match and no slot was filled twice, so every slot is filled
    Ok(slots.into_iter().flatten().collect())
}

/// Elementwise |estimate - truth|
pub fn absolute_error(estimates: &Array2<f32>, truth: &Array2<f32>) -> Result<Array2<f32>> {
    if estimates.dim() != truth.dim() {
        return Err(JesterError::DataIntegrity(format!(
            "Estimates {:?} and true ratings {:?} differ in shape",
            estimates.dim(),
            truth.dim()
        )));
    }
    Ok((estimates - truth).mapv(f32::abs))
}
