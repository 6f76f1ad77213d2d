//! # Train/Validation Splitting
//!
//! Two ways of partitioning an [`EncodedDataset`]:
//!
//! - [`train_validation_split`] shuffles all rows once and holds out a
//!   validation fraction.
//! - [`WindowedSplitter`] shuffles all rows once, walks the permutation in
//!   non-overlapping windows, and applies the same hold-out inside each window.
//!   It is an iterator; a window is only gathered when the caller asks for it.

use crate::dataset::EncodedDataset;
use rand::Rng;
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("Validation fraction must be in [0, 1), got {0}.")]
    ValidationFractionOutOfRange(f64),
    #[error("Window size must be at least 1 row.")]
    ZeroWindow,
    #[error(
        "Holding out {validation_fraction} of {rows} rows leaves no training rows."
    )]
    EmptyTrainingSet { rows: usize, validation_fraction: f64 },
}

/// Disjoint row indices covering one table or window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPartition {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// The four row-aligned arrays handed to the trainer: training features and
/// targets, validation features and targets.
#[derive(Debug, Clone)]
pub struct TrainValidationSplit {
    pub train: EncodedDataset,
    pub validation: EncodedDataset,
}

/// Validation rows held out of `n`; rounds up so a non-zero fraction always
/// holds out at least one row.
pub fn validation_size(n: usize, validation_fraction: f64) -> usize {
    ((n as f64) * validation_fraction).ceil() as usize
}

fn check_fraction(validation_fraction: f64) -> Result<(), SplitError> {
    if (0.0..1.0).contains(&validation_fraction) {
        Ok(())
    } else {
        Err(SplitError::ValidationFractionOutOfRange(validation_fraction))
    }
}

/// Shuffles `rows` and holds out the first `validation_size` of the permutation.
pub fn partition_rows<R: Rng + ?Sized>(
    rows: &[usize],
    validation_fraction: f64,
    rng: &mut R,
) -> SplitPartition {
    let mut order = rows.to_vec();
    order.shuffle(rng);
    let n_validation = validation_size(order.len(), validation_fraction).min(order.len());
    let train = order.split_off(n_validation);
    SplitPartition {
        train,
        validation: order,
    }
}

fn realize(dataset: &EncodedDataset, partition: &SplitPartition) -> TrainValidationSplit {
    TrainValidationSplit {
        train: dataset.select(&partition.train),
        validation: dataset.select(&partition.validation),
    }
}

/// One-shot split of every row of `dataset`.
pub fn train_validation_split<R: Rng + ?Sized>(
    dataset: &EncodedDataset,
    validation_fraction: f64,
    rng: &mut R,
) -> Result<TrainValidationSplit, SplitError> {
    check_fraction(validation_fraction)?;
    let rows: Vec<usize> = (0..dataset.len()).collect();
    let partition = partition_rows(&rows, validation_fraction, rng);
    if partition.train.is_empty() {
        return Err(SplitError::EmptyTrainingSet {
            rows: dataset.len(),
            validation_fraction,
        });
    }
    log::info!(
        "Split {} rows into {} training and {} validation rows",
        dataset.len(),
        partition.train.len(),
        partition.validation.len()
    );
    Ok(realize(dataset, &partition))
}

/// Lazily yields one train/validation split per window of a shuffled row order.
///
/// With `drop_incomplete_final_batch` set, exactly `floor(n / window)` splits
/// are produced and trailing rows that do not fill a window are never used.
/// Otherwise the trailing rows form one last, smaller window; its training side
/// may be empty when it holds very few rows.
pub struct WindowedSplitter<'a, R: Rng> {
    dataset: &'a EncodedDataset,
    order: Vec<usize>,
    window: usize,
    validation_fraction: f64,
    drop_incomplete_final_batch: bool,
    cursor: usize,
    rng: R,
}

impl<'a, R: Rng> WindowedSplitter<'a, R> {
    pub fn new(
        dataset: &'a EncodedDataset,
        window: usize,
        validation_fraction: f64,
        drop_incomplete_final_batch: bool,
        mut rng: R,
    ) -> Result<Self, SplitError> {
        check_fraction(validation_fraction)?;
        if window == 0 {
            return Err(SplitError::ZeroWindow);
        }
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(&mut rng);
        Ok(Self {
            dataset,
            order,
            window,
            validation_fraction,
            drop_incomplete_final_batch,
            cursor: 0,
            rng,
        })
    }

    /// Total number of windows this splitter yields from the start.
    pub fn window_count(&self) -> usize {
        let n = self.order.len();
        if self.drop_incomplete_final_batch {
            n / self.window
        } else {
            n.div_ceil(self.window)
        }
    }

    /// Rows never visited because they did not fill a final window.
    pub fn dropped_rows(&self) -> usize {
        if self.drop_incomplete_final_batch {
            self.order.len() % self.window
        } else {
            0
        }
    }
}

impl<R: Rng> Iterator for WindowedSplitter<'_, R> {
    type Item = TrainValidationSplit;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.order.len() - self.cursor;
        if remaining == 0 || (remaining < self.window && self.drop_incomplete_final_batch) {
            return None;
        }
        let end = (self.cursor + self.window).min(self.order.len());
        let partition = partition_rows(
            &self.order[self.cursor..end],
            self.validation_fraction,
            &mut self.rng,
        );
        self.cursor = end;
        log::debug!(
            "Window ending at row {}: {} training / {} validation",
            end,
            partition.train.len(),
            partition.validation.len()
        );
        Some(realize(self.dataset, &partition))
    }
}
