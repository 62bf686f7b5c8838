//! Rating tables and burn batching
//!
//! Ratings are read from `uID,jID,rating` CSV files whose ratings carry a
//! constant offset; the offset is removed on load.

use std::collections::BTreeSet;
use std::path::Path;

use crate::{ItemId, RatingRecord, Result, UserId};

/// Constant shift applied to stored ratings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingShift {
    pub offset: f32,
}

impl RatingShift {
    pub fn new(offset: f32) -> Self {
        RatingShift { offset }
    }

    /// Stored value -> original rating scale
    pub fn restore(&self, stored: f32) -> f32 {
        stored - self.offset
    }

    /// Original rating scale -> stored value
    pub fn shift(&self, rating: f32) -> f32 {
        rating + self.offset
    }
}

/// In-memory table of rating records
#[derive(Debug, Clone, Default)]
pub struct RatingDataset {
    records: Vec<RatingRecord>,
}

impl RatingDataset {
    pub fn new(records: Vec<RatingRecord>) -> Self {
        RatingDataset { records }
    }

    /// Load a `uID,jID,rating` CSV file, undoing the stored rating shift
    pub fn from_csv<P: AsRef<Path>>(path: P, shift: RatingShift) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let mut records = Vec::new();
        for row in reader.deserialize::<RatingRecord>() {
            let mut record = row?;
            record.rating = shift.restore(record.rating);
            records.push(record);
        }

        log::debug!(
            "Loaded {} ratings from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(RatingDataset { records })
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.records.iter().map(|r| r.user).collect()
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.records.iter().map(|r| r.item).collect()
    }

    pub fn ratings(&self) -> Vec<f32> {
        self.records.iter().map(|r| r.rating).collect()
    }

    /// Distinct users, ascending
    pub fn distinct_users(&self) -> Vec<UserId> {
        self.records
            .iter()
            .map(|r| r.user)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn max_user(&self) -> Option<UserId> {
        self.records.iter().map(|r| r.user).max()
    }

    pub fn max_item(&self) -> Option<ItemId> {
        self.records.iter().map(|r| r.item).max()
    }
}

/// Batch of ratings for training
#[derive(Debug, Clone)]
pub struct RatingBatch<B: burn::tensor::backend::Backend> {
    /// User IDs: [batch]
    pub users: burn::tensor::Tensor<B, 1, burn::tensor::Int>,
    /// Item IDs: [batch]
    pub items: burn::tensor::Tensor<B, 1, burn::tensor::Int>,
    /// Target ratings: [batch]
    pub ratings: burn::tensor::Tensor<B, 1>,
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct RatingBatcher<B: burn::tensor::backend::Backend> {
    device: B::Device,
}

impl<B: burn::tensor::backend::Backend> RatingBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        RatingBatcher { device }
    }
}

impl<B: burn::tensor::backend::Backend>
    burn::data::dataloader::batcher::Batcher<B, RatingRecord, RatingBatch<B>> for RatingBatcher<B>
{
    fn batch(&self, items: Vec<RatingRecord>, _device: &B::Device) -> RatingBatch<B> {
        let users: Vec<i32> = items.iter().map(|r| r.user as i32).collect();
        let item_ids: Vec<i32> = items.iter().map(|r| r.item as i32).collect();
        let ratings: Vec<f32> = items.iter().map(|r| r.rating).collect();

        RatingBatch {
            users: burn::tensor::Tensor::<B, 1, burn::tensor::Int>::from_ints(
                users.as_slice(),
                &self.device,
            ),
            items: burn::tensor::Tensor::<B, 1, burn::tensor::Int>::from_ints(
                item_ids.as_slice(),
                &self.device,
            ),
            ratings: burn::tensor::Tensor::<B, 1>::from_floats(ratings.as_slice(), &self.device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;
    use std::io::Write;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_rating_shift() {
        let shift = RatingShift::new(10.0);
        assert_eq!(shift.restore(12.5), 2.5);
        assert_eq!(shift.shift(-10.0), 0.0);
        assert_eq!(shift.restore(shift.shift(-3.25)), -3.25);
    }

    #[test]
    fn test_load_csv_removes_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("60_1_test.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "uID,jID,rating").unwrap();
        writeln!(file, "7,1,18.5").unwrap();
        writeln!(file, "3,2,0.0").unwrap();
        writeln!(file, "7,3,10").unwrap();
        drop(file);

        let dataset = RatingDataset::from_csv(&path, RatingShift::new(10.0)).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.records()[0], RatingRecord::new(7, 1, 8.5));
        assert_eq!(dataset.records()[1].rating, -10.0);
        assert_eq!(dataset.distinct_users(), vec![3, 7]);
        assert_eq!(dataset.max_user(), Some(7));
        assert_eq!(dataset.max_item(), Some(3));
    }

    #[test]
    fn test_load_csv_missing_file() {
        let result = RatingDataset::from_csv("does/not/exist.csv", RatingShift::new(0.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_batcher_shapes() {
        let device = Default::default();
        let batcher = RatingBatcher::<TestBackend>::new(device);
        let records = vec![
            RatingRecord::new(1, 4, 2.0),
            RatingRecord::new(2, 5, -1.0),
            RatingRecord::new(3, 6, 0.5),
        ];

        let batch = batcher.batch(records, &Default::default());
        assert_eq!(batch.users.dims(), [3]);
        assert_eq!(batch.items.dims(), [3]);

        let ratings: Vec<f32> = batch.ratings.into_data().iter::<f32>().collect();
        assert_eq!(ratings, vec![2.0, -1.0, 0.5]);
    }
}
