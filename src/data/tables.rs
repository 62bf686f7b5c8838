//! User x item tables: true test ratings and baseline estimates
//!
//! Each table has a header row, a leading user ID column and one column per
//! item. Rows are matched to the canonical user order by ID.

use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;

use crate::{JesterError, Result, UserId};

/// A dense user x item table keyed by user ID
#[derive(Debug, Clone)]
pub struct UserMatrix {
    pub user_ids: Vec<UserId>,
    pub values: Array2<f32>,
}

impl UserMatrix {
    /// Read a table with `n_items` value columns after the user column
    pub fn from_csv<P: AsRef<Path>>(path: P, n_items: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut user_ids = Vec::new();
        let mut data = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            if row.len() < n_items + 1 {
                return Err(JesterError::DataIntegrity(format!(
                    "{} row {}: expected {} columns, found {}",
                    path.display(),
                    line + 1,
                    n_items + 1,
                    row.len()
                )));
            }

            let user = parse_user(&row[0], path, line)?;
            user_ids.push(user);
            for field in row.iter().skip(1).take(n_items) {
                data.push(parse_number(field, path, line)? as f32);
            }
        }

        let values = Array2::from_shape_vec((user_ids.len(), n_items), data)
            .map_err(|e| JesterError::DataIntegrity(e.to_string()))?;

        log::debug!("Loaded {} x {} table from {}", user_ids.len(), n_items, path.display());
        Ok(UserMatrix { user_ids, values })
    }

    /// Rows permuted into `order`; every user in `order` must be present
    pub fn aligned_to(&self, order: &[UserId]) -> Result<Array2<f32>> {
        let rows: HashMap<UserId, usize> = self
            .user_ids
            .iter()
            .enumerate()
            .map(|(row, &user)| (user, row))
            .collect();

        let n_items = self.values.ncols();
        let mut aligned = Array2::zeros((order.len(), n_items));
        for (rank, user) in order.iter().enumerate() {
            let row = rows.get(user).ok_or_else(|| {
                JesterError::DataIntegrity(format!("User {} missing from table", user))
            })?;
            aligned.row_mut(rank).assign(&self.values.row(*row));
        }
        Ok(aligned)
    }
}

fn parse_number(field: &str, path: &Path, line: usize) -> Result<f64> {
    field.parse::<f64>().map_err(|_| {
        JesterError::DataIntegrity(format!(
            "{} row {}: invalid number '{}'",
            path.display(),
            line + 1,
            field
        ))
    })
}

/// User IDs may be written as `12` or `12.0`, never `12.5`
fn parse_user(field: &str, path: &Path, line: usize) -> Result<UserId> {
    let value = parse_number(field, path, line)?;
    if value.fract() != 0.0 || !value.is_finite() {
        return Err(JesterError::DataIntegrity(format!(
            "{} row {}: user ID '{}' is not an integer",
            path.display(),
            line + 1,
            field
        )));
    }
    Ok(value as UserId)
}

/// The three baseline estimators compared against the model
#[derive(Debug, Clone)]
pub struct Baselines {
    pub uniform: Array2<f32>,
    pub user_average: Array2<f32>,
    pub total_average: Array2<f32>,
}

impl Baselines {
    /// Load all three baseline tables aligned to `order`
    pub fn load(
        uniform_path: &Path,
        user_avg_path: &Path,
        total_avg_path: &Path,
        n_items: usize,
        order: &[UserId],
    ) -> Result<Self> {
        Ok(Baselines {
            uniform: UserMatrix::from_csv(uniform_path, n_items)?.aligned_to(order)?,
            user_average: UserMatrix::from_csv(user_avg_path, n_items)?.aligned_to(order)?,
            total_average: UserMatrix::from_csv(total_avg_path, n_items)?.aligned_to(order)?,
        })
    }
}
