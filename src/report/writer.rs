//! CSV output for report tables

use std::fmt::Display;
use std::path::Path;

use ndarray::Array2;

use crate::{JesterError, Result, UserId};

/// Header `uID,rec1,...,recJ`
fn header(n_items: usize) -> Vec<String> {
    std::iter::once("uID".to_string())
        .chain((1..=n_items).map(|k| format!("rec{}", k)))
        .collect()
}

/// Write a [users, items] table with a leading user ID column
pub fn write_table<T: Display>(path: &Path, user_ids: &[UserId], values: &Array2<T>) -> Result<()> {
    if user_ids.len() != values.nrows() {
        return Err(JesterError::DataIntegrity(format!(
            "{} user IDs for a table of {} rows",
            user_ids.len(),
            values.nrows()
        )));
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header(values.ncols()))?;
    for (user, row) in user_ids.iter().zip(values.rows()) {
        let record = std::iter::once(user.to_string()).chain(row.iter().map(|v| v.to_string()));
        writer.write_record(record)?;
    }
    writer.flush()?;

    log::debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_header() {
        assert_eq!(header(3), vec!["uID", "rec1", "rec2", "rec3"]);
    }

    #[test]
    fn test_write_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AE_mlp.csv");
        write_table(&path, &[7, 3], &array![[0.5, 2.0], [1.25, 0.0]]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "uID,rec1,rec2\n7,0.5,2\n3,1.25,0\n");
    }

    #[test]
    fn test_row_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        assert!(write_table(&path, &[1], &array![[1.0], [2.0]]).is_err());
    }
}
