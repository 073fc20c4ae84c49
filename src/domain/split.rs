//! Causal train/test partitioning of a week-sorted feature table.
//!
//! Row order is the single source of truth for causality: nothing here ever
//! sorts, and any non-increasing week is rejected.

use chrono::NaiveDate;

use super::error::CotraderError;
use super::feature_table::{FeatureRow, FeatureTable};

/// Borrowed view of one checkpoint's train and test rows.
#[derive(Debug, Clone, Copy)]
pub struct Split<'a> {
    pub checkpoint: NaiveDate,
    pub columns: &'a [String],
    pub train: &'a [FeatureRow],
    pub test: &'a [FeatureRow],
}

impl<'a> Split<'a> {
    /// Cut the test window short of `next_checkpoint` (exclusive).
    pub fn bounded(self, next_checkpoint: Option<NaiveDate>) -> Split<'a> {
        match next_checkpoint {
            Some(next) => {
                let end = self.test.partition_point(|r| r.week < next);
                Split {
                    test: &self.test[..end],
                    ..self
                }
            }
            None => self,
        }
    }

    /// Drop the last `weeks` train rows whose forward labels reach into the test period.
    pub fn purged(self, weeks: usize) -> Split<'a> {
        let keep = self.train.len().saturating_sub(weeks);
        Split {
            train: &self.train[..keep],
            ..self
        }
    }
}

/// Fail unless weeks are strictly increasing.
pub fn ensure_sorted(rows: &[FeatureRow]) -> Result<(), CotraderError> {
    for (i, pair) in rows.windows(2).enumerate() {
        if pair[1].week <= pair[0].week {
            return Err(CotraderError::UnsortedSeries {
                index: i + 1,
                previous: pair[0].week,
                current: pair[1].week,
            });
        }
    }
    Ok(())
}

/// Train = weeks before `checkpoint`; test = weeks on or after it.
///
/// An empty train side is a caller error: no model can be fit on nothing.
pub fn split(table: &FeatureTable, checkpoint: NaiveDate) -> Result<Split<'_>, CotraderError> {
    ensure_sorted(&table.rows)?;

    let boundary = table.rows.partition_point(|r| r.week < checkpoint);
    if boundary == 0 {
        return Err(CotraderError::EmptyTrainSet { checkpoint });
    }

    Ok(Split {
        checkpoint,
        columns: &table.columns,
        train: &table.rows[..boundary],
        test: &table.rows[boundary..],
    })
}

/// Expanding-window folds over `n` rows: (train end, test range) pairs.
///
/// Each test block has `n / (n_splits + 1)` rows; the first fold trains on
/// whatever precedes the first block.
pub fn time_series_folds(
    n: usize,
    n_splits: usize,
) -> Vec<(usize, std::ops::Range<usize>)> {
    if n_splits == 0 || n <= n_splits {
        return Vec::new();
    }
    let test_size = n / (n_splits + 1);
    if test_size == 0 {
        return Vec::new();
    }
    let first_test = n - n_splits * test_size;
    (0..n_splits)
        .map(|k| {
            let start = first_test + k * test_size;
            (start, start..start + test_size)
        })
        .collect()
}
