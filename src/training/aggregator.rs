//! Per-epoch capture of validation estimates across pairs
//!
//! Every pair owns a fixed row range of each epoch's triple buffer, derived
//! from cumulative validation sizes in pair order. Cells and error-curve
//! entries are written exactly once.

use ndarray::Array2;

use crate::model::Predictor;
use crate::{ItemId, JesterError, RatingRecord, Result, UserId};

/// Row ranges of each pair inside the shared per-epoch buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairLayout {
    sizes: Vec<usize>,
    offsets: Vec<usize>,
}

impl PairLayout {
    /// Offsets are the cumulative sums of the preceding validation sizes
    pub fn new(validation_sizes: &[usize]) -> Self {
        let offsets = validation_sizes
            .iter()
            .scan(0usize, |acc, &size| {
                let offset = *acc;
                *acc += size;
                Some(offset)
            })
            .collect();

        PairLayout {
            sizes: validation_sizes.to_vec(),
            offsets,
        }
    }

    pub fn pair_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn offset(&self, pair: usize) -> Option<usize> {
        self.offsets.get(pair).copied()
    }

    pub fn size(&self, pair: usize) -> Option<usize> {
        self.sizes.get(pair).copied()
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Total validation rows across all pairs
    pub fn total_rows(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// Check that ranges are contiguous, ordered and non-overlapping
    pub fn verify_disjoint(&self) -> Result<()> {
        let mut expected = 0;
        for (pair, (&offset, &size)) in self.offsets.iter().zip(&self.sizes).enumerate() {
            if offset != expected {
                return Err(JesterError::DataIntegrity(format!(
                    "Pair {} starts at row {}, expected {}",
                    pair, offset, expected
                )));
            }
            expected += size;
        }
        Ok(())
    }
}

/// One flattened validation estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateTriple {
    pub user: UserId,
    pub item: ItemId,
    pub prediction: f32,
}

/// Write-once slots for one epoch's validation estimates
#[derive(Debug, Clone)]
pub struct TripleBuffer {
    epoch: usize,
    cells: Vec<Option<EstimateTriple>>,
}

impl TripleBuffer {
    pub fn new(epoch: usize, rows: usize) -> Self {
        TripleBuffer {
            epoch,
            cells: vec![None; rows],
        }
    }

    /// Build a fully written buffer without the write-once checks
    #[cfg(test)]
    pub(crate) fn from_triples(epoch: usize, triples: Vec<EstimateTriple>) -> Self {
        TripleBuffer {
            epoch,
            cells: triples.into_iter().map(Some).collect(),
        }
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Option<EstimateTriple>] {
        &self.cells
    }

    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Write a contiguous region starting at `offset`
    ///
    /// Nothing is written unless the whole region is in range and empty.
    pub fn write_region(&mut self, offset: usize, triples: &[EstimateTriple]) -> Result<()> {
        let end = offset + triples.len();
        if end > self.cells.len() {
            return Err(JesterError::DataIntegrity(format!(
                "Rows {}..{} exceed buffer of {} rows",
                offset,
                end,
                self.cells.len()
            )));
        }
        if let Some(row) = (offset..end).find(|&row| self.cells[row].is_some()) {
            return Err(JesterError::DuplicateWrite {
                epoch: self.epoch,
                row,
            });
        }

        for (cell, triple) in self.cells[offset..end].iter_mut().zip(triples) {
            *cell = Some(*triple);
        }
        Ok(())
    }
}

/// Training and validation MAE per pair and epoch
#[derive(Debug, Clone)]
pub struct ErrorCurves {
    /// [pairs, epochs]
    train: Array2<f64>,
    /// [pairs, epochs]
    validation: Array2<f64>,
    written: Array2<bool>,
}

impl ErrorCurves {
    pub fn new(pairs: usize, epochs: usize) -> Self {
        ErrorCurves {
            train: Array2::zeros((pairs, epochs)),
            validation: Array2::zeros((pairs, epochs)),
            written: Array2::from_elem((pairs, epochs), false),
        }
    }

    pub fn record(&mut self, pair: usize, epoch: usize, train: f64, validation: f64) -> Result<()> {
        let cell = self.written.get_mut((pair, epoch)).ok_or_else(|| {
            JesterError::DataIntegrity(format!(
                "Pair {} / epoch {} outside error curves of shape {:?}",
                pair,
                epoch,
                self.train.dim()
            ))
        })?;
        if *cell {
            return Err(JesterError::DataIntegrity(format!(
                "Error curves already recorded for pair {}, epoch {}",
                pair, epoch
            )));
        }
        *cell = true;
        self.train[[pair, epoch]] = train;
        self.validation[[pair, epoch]] = validation;
        Ok(())
    }

    pub fn train(&self) -> &Array2<f64> {
        &self.train
    }

    pub fn validation(&self) -> &Array2<f64> {
        &self.validation
    }

    /// Hand over (train, validation)
    pub fn into_arrays(self) -> (Array2<f64>, Array2<f64>) {
        (self.train, self.validation)
    }

    /// True once every (pair, epoch) cell has been recorded
    pub fn is_complete(&self) -> bool {
        self.written.iter().all(|&w| w)
    }
}

/// Everything known about one pair at the end of one epoch
#[derive(Debug, Clone, Copy)]
pub struct EpochEnd<'a> {
    pub epoch: usize,
    pub pair_index: usize,
    pub row_offset: usize,
    pub validation: &'a [RatingRecord],
    pub training_error: f64,
    pub validation_error: f64,
}

/// Capability injected into the training loop, run once per epoch
pub trait EpochEndHook {
    fn on_epoch_end(&mut self, end: &EpochEnd<'_>, model: &dyn Predictor) -> Result<()>;
}

/// Owns the per-epoch triple buffers and the error curves of an experiment
#[derive(Debug, Clone)]
pub struct EstimateAggregator {
    layout: PairLayout,
    buffers: Vec<TripleBuffer>,
    curves: ErrorCurves,
}

impl EstimateAggregator {
    /// Allocate one buffer per epoch, sized to the layout's total rows
    pub fn new(layout: PairLayout, epochs: usize) -> Result<Self> {
        layout.verify_disjoint()?;
        let rows = layout.total_rows();
        log::debug!(
            "Allocating {} epoch buffers of {} rows for {} pairs",
            epochs,
            rows,
            layout.pair_count()
        );

        Ok(EstimateAggregator {
            buffers: (0..epochs).map(|epoch| TripleBuffer::new(epoch, rows)).collect(),
            curves: ErrorCurves::new(layout.pair_count(), epochs),
            layout,
        })
    }

    pub fn layout(&self) -> &PairLayout {
        &self.layout
    }

    pub fn epochs(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffers(&self) -> &[TripleBuffer] {
        &self.buffers
    }

    pub fn curves(&self) -> &ErrorCurves {
        &self.curves
    }

    pub fn into_parts(self) -> (Vec<TripleBuffer>, ErrorCurves) {
        (self.buffers, self.curves)
    }

    fn check_region(&self, end: &EpochEnd<'_>) -> Result<()> {
        let (offset, size) = self
            .layout
            .offset(end.pair_index)
            .zip(self.layout.size(end.pair_index))
            .ok_or_else(|| {
                JesterError::DataIntegrity(format!(
                    "Pair {} not in layout of {} pairs",
                    end.pair_index,
                    self.layout.pair_count()
                ))
            })?;

        if end.row_offset != offset {
            return Err(JesterError::DataIntegrity(format!(
                "Pair {} wrote at row {}, its range starts at {}",
                end.pair_index, end.row_offset, offset
            )));
        }
        if end.validation.len() != size {
            return Err(JesterError::DataIntegrity(format!(
                "Pair {} has {} validation rows, layout expects {}",
                end.pair_index,
                end.validation.len(),
                size
            )));
        }
        Ok(())
    }
}

impl EpochEndHook for EstimateAggregator {
    fn on_epoch_end(&mut self, end: &EpochEnd<'_>, model: &dyn Predictor) -> Result<()> {
        self.check_region(end)?;
        let epochs = self.buffers.len();
        let buffer = self.buffers.get_mut(end.epoch).ok_or_else(|| {
            JesterError::DataIntegrity(format!(
                "Epoch {} beyond the {} allocated buffers",
                end.epoch, epochs
            ))
        })?;

        // Reject a repeated call before paying for inference
        if let Some(row) = (end.row_offset..end.row_offset + end.validation.len())
            .find(|&row| buffer.cells[row].is_some())
        {
            return Err(JesterError::DuplicateWrite {
                epoch: end.epoch,
                row,
            });
        }

        let users: Vec<UserId> = end.validation.iter().map(|r| r.user).collect();
        let items: Vec<ItemId> = end.validation.iter().map(|r| r.item).collect();
        let predictions = model.predict(&users, &items)?;
        if predictions.len() != users.len() {
            return Err(JesterError::Model(format!(
                "Predictor returned {} values for {} rows",
                predictions.len(),
                users.len()
            )));
        }

        let triples: Vec<EstimateTriple> = users
            .iter()
            .zip(&items)
            .zip(&predictions)
            .map(|((&user, &item), &prediction)| EstimateTriple {
                user,
                item,
                prediction,
            })
            .collect();

        buffer.write_region(end.row_offset, &triples)?;
        self.curves.record(
            end.pair_index,
            end.epoch,
            end.training_error,
            end.validation_error,
        )?;

        log::debug!(
            "Captured {} estimates for pair {} at epoch {}",
            triples.len(),
            end.pair_index + 1,
            end.epoch + 1
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts `user * 10 + item` so cells are easy to check
    struct FormulaPredictor;

    impl Predictor for FormulaPredictor {
        fn predict(&self, users: &[UserId], items: &[ItemId]) -> Result<Vec<f32>> {
            Ok(users
                .iter()
                .zip(items)
                .map(|(&u, &j)| (u * 10 + j) as f32)
                .collect())
        }
    }

    fn records(user: UserId, items: &[ItemId]) -> Vec<RatingRecord> {
        items
            .iter()
            .map(|&item| RatingRecord::new(user, item, 0.0))
            .collect()
    }

    #[test]
    fn test_layout_offsets() {
        let layout = PairLayout::new(&[9900, 10200, 9900]);
        assert_eq!(layout.offsets(), &[0, 9900, 20100]);
        assert_eq!(layout.total_rows(), 30000);
        assert!(layout.verify_disjoint().is_ok());
    }

    #[test]
    fn test_layout_ninety_pairs() {
        let counts = crate::Proportion::Ninety.rating_counts();
        let layout = PairLayout::new(counts);
        assert_eq!(layout.pair_count(), 12);
        assert_eq!(layout.offset(1), Some(2400));
        assert_eq!(layout.offset(11), Some(30000 - 2400));
        assert_eq!(layout.total_rows(), 30000);
    }

    #[test]
    fn test_buffer_rejects_overwrite() {
        let mut buffer = TripleBuffer::new(3, 4);
        let triple = EstimateTriple {
            user: 1,
            item: 1,
            prediction: 0.5,
        };
        buffer.write_region(1, &[triple, triple]).unwrap();
        assert_eq!(buffer.filled(), 2);

        let err = buffer.write_region(2, &[triple]).unwrap_err();
        assert!(matches!(err, JesterError::DuplicateWrite { epoch: 3, row: 2 }));

        // Overlapping write leaves the untouched row empty
        assert!(buffer.write_region(0, &[triple, triple]).is_err());
        assert!(buffer.cells()[0].is_none());

        assert!(buffer.write_region(3, &[triple, triple]).is_err());
    }

    #[test]
    fn test_on_epoch_end_writes_region_and_curves() {
        let layout = PairLayout::new(&[2, 3]);
        let mut aggregator = EstimateAggregator::new(layout, 2).unwrap();
        let pair0 = records(1, &[1, 2]);
        let pair1 = records(2, &[1, 2, 3]);

        for epoch in 0..2 {
            for (pair_index, validation) in [&pair0, &pair1].into_iter().enumerate() {
                let end = EpochEnd {
                    epoch,
                    pair_index,
                    row_offset: aggregator.layout().offset(pair_index).unwrap(),
                    validation,
                    training_error: 1.0 + epoch as f64,
                    validation_error: 2.0 + pair_index as f64,
                };
                aggregator.on_epoch_end(&end, &FormulaPredictor).unwrap();
            }
        }

        assert!(aggregator.curves().is_complete());
        assert_eq!(aggregator.curves().train()[[1, 1]], 2.0);
        assert_eq!(aggregator.curves().validation()[[1, 0]], 3.0);

        let buffer = &aggregator.buffers()[1];
        assert_eq!(buffer.filled(), 5);
        assert_eq!(
            buffer.cells()[2],
            Some(EstimateTriple {
                user: 2,
                item: 1,
                prediction: 21.0
            })
        );
    }

    #[test]
    fn test_error_curves_record_once() {
        let mut curves = ErrorCurves::new(2, 2);
        curves.record(0, 1, 0.5, 0.75).unwrap();
        assert!(curves.record(0, 1, 9.0, 9.0).is_err());
        assert!(curves.record(2, 0, 1.0, 1.0).is_err());
        assert_eq!(curves.train()[[0, 1]], 0.5);
        assert_eq!(curves.validation()[[0, 1]], 0.75);
        assert!(!curves.is_complete());

        curves.record(0, 0, 1.0, 1.0).unwrap();
        curves.record(1, 0, 1.0, 1.0).unwrap();
        curves.record(1, 1, 1.0, 1.0).unwrap();
        assert!(curves.is_complete());
        let (train, validation) = curves.into_arrays();
        assert_eq!(train.dim(), (2, 2));
        assert_eq!(validation[[0, 1]], 0.75);
    }

    #[test]
    fn test_on_epoch_end_twice_fails() {
        let mut aggregator = EstimateAggregator::new(PairLayout::new(&[2]), 1).unwrap();
        let validation = records(5, &[1, 2]);
        let end = EpochEnd {
            epoch: 0,
            pair_index: 0,
            row_offset: 0,
            validation: &validation,
            training_error: 0.1,
            validation_error: 0.2,
        };

        aggregator.on_epoch_end(&end, &FormulaPredictor).unwrap();
        let err = aggregator.on_epoch_end(&end, &FormulaPredictor).unwrap_err();
        assert!(matches!(err, JesterError::DuplicateWrite { epoch: 0, row: 0 }));
    }

    #[test]
    fn test_on_epoch_end_rejects_wrong_offset() {
        let mut aggregator = EstimateAggregator::new(PairLayout::new(&[2, 2]), 1).unwrap();
        let validation = records(5, &[1, 2]);
        let end = EpochEnd {
            epoch: 0,
            pair_index: 1,
            row_offset: 1,
            validation: &validation,
            training_error: 0.1,
            validation_error: 0.2,
        };
        assert!(matches!(
            aggregator.on_epoch_end(&end, &FormulaPredictor),
            Err(JesterError::DataIntegrity(_))
        ));

        let short = records(5, &[1]);
        let end = EpochEnd {
            row_offset: 2,
            validation: &short,
            ..end
        };
        assert!(matches!(
            aggregator.on_epoch_end(&end, &FormulaPredictor),
            Err(JesterError::DataIntegrity(_))
        ));
    }
}
