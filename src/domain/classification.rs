//! Classifier scoring: holdout validation and expanding-window cross
//! validation used to pick the model written as the artifact.

use chrono::NaiveDate;

use super::error::CotraderError;
use super::feature_table::{FeatureRow, FeatureTable};
use super::model::{ModelAdapter, ModelFactory, ModelSpec};
use super::split;
use crate::ports::event_port::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Score predictions with class 1 as the positive class. Any zero
    /// denominator yields 0 for that statistic.
    pub fn score(truth: &[u8], predicted: &[u8]) -> Self {
        let mut tp = 0;
        let mut fp = 0;
        let mut fn_ = 0;
        let mut correct = 0;
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (1, 1) => tp += 1,
                (0, 1) => fp += 1,
                (1, 0) => fn_ += 1,
                _ => {}
            }
            correct += usize::from(t == p);
        }
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassificationReport {
            accuracy: ratio(correct, truth.len()),
            precision,
            recall,
            f1,
            support: truth.len(),
        }
    }
}

fn labels(
    columns: &[String],
    rows: &[FeatureRow],
    label_column: &str,
) -> Result<Vec<u8>, CotraderError> {
    let idx = columns
        .iter()
        .position(|c| c == label_column)
        .ok_or_else(|| CotraderError::missing_column(label_column))?;
    Ok(rows.iter().map(|r| u8::from(r.values[idx] == 1.0)).collect())
}

fn fit_and_score(
    factory: &dyn ModelFactory,
    columns: &[String],
    train: &[FeatureRow],
    test: &[FeatureRow],
    label_column: &str,
) -> Result<ClassificationReport, CotraderError> {
    let mut adapter = ModelAdapter::new(factory.build()).excluding(label_column);
    adapter.fit(columns, train, label_column)?;
    let predicted = adapter.predict(columns, test)?;
    Ok(ClassificationReport::score(
        &labels(columns, test, label_column)?,
        &predicted,
    ))
}

/// Fit on weeks before `test_start`, score on the rest.
pub fn holdout(
    table: &FeatureTable,
    test_start: NaiveDate,
    factory: &dyn ModelFactory,
    label_column: &str,
    sink: &dyn EventSink,
) -> Result<ClassificationReport, CotraderError> {
    let s = split::split(table, test_start)?;
    if s.test.is_empty() {
        sink.info(&format!("holdout from {}: no test rows", test_start));
        return Ok(ClassificationReport::default());
    }
    let report = fit_and_score(factory, s.columns, s.train, s.test, label_column)?;
    sink.info(&format!(
        "holdout from {}: {} train / {} test rows, accuracy {:.3}, f1 {:.3}",
        test_start,
        s.train.len(),
        s.test.len(),
        report.accuracy,
        report.f1
    ));
    Ok(report)
}

/// Fold count used when none is given: 5 for more than six rows, otherwise
/// one fewer than the row count (at least 2).
pub fn default_splits(n_rows: usize) -> usize {
    if n_rows > 6 { 5 } else { n_rows.saturating_sub(1).max(2) }
}

/// Score `factory` on expanding-window folds, one report per fold.
pub fn cross_validate(
    table: &FeatureTable,
    factory: &dyn ModelFactory,
    n_splits: Option<usize>,
    label_column: &str,
) -> Result<Vec<ClassificationReport>, CotraderError> {
    split::ensure_sorted(&table.rows)?;
    table.require_column(label_column)?;
    let n = table.len();
    let n_splits = n_splits.unwrap_or_else(|| default_splits(n));
    let folds = split::time_series_folds(n, n_splits);
    if folds.is_empty() {
        return Err(CotraderError::model(format!(
            "{} rows are too few for {} folds",
            n, n_splits
        )));
    }
    folds
        .into_iter()
        .map(|(train_end, test)| {
            fit_and_score(
                factory,
                &table.columns,
                &table.rows[..train_end],
                &table.rows[test],
                label_column,
            )
        })
        .collect()
}

pub fn default_candidates() -> Vec<ModelSpec> {
    vec![
        ModelSpec::Logistic(Default::default()),
        ModelSpec::RandomForest(Default::default()),
    ]
}

/// Pick the candidate with the highest mean fold F1; earlier candidates win ties.
pub fn select_best_model(
    table: &FeatureTable,
    candidates: &[ModelSpec],
    n_splits: Option<usize>,
    label_column: &str,
    sink: &dyn EventSink,
) -> Result<(ModelSpec, f64), CotraderError> {
    let mut best: Option<(&ModelSpec, f64)> = None;
    for spec in candidates {
        let folds = cross_validate(table, spec, n_splits, label_column)?;
        let mean_f1 = folds.iter().map(|r| r.f1).sum::<f64>() / folds.len() as f64;
        sink.info(&format!(
            "{}: mean f1 {:.4} over {} folds",
            spec,
            mean_f1,
            folds.len()
        ));
        if best.is_none_or(|(_, f1)| mean_f1 > f1) {
            best = Some((spec, mean_f1));
        }
    }
    best.map(|(spec, f1)| (spec.clone(), f1))
        .ok_or_else(|| CotraderError::model("no candidate models to evaluate"))
}
