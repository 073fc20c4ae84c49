//! Classifier seam and the column-hygiene adapter the engine fits through.
//!
//! The engine never sees a concrete learning algorithm. It asks a
//! [`ModelFactory`] for a fresh [`Classifier`] at every checkpoint and feeds
//! it only the numeric feature columns selected by [`ModelAdapter`].

pub mod constant;
pub mod forest;
pub mod logistic;
pub mod spec;

pub use constant::ConstantClassifier;
pub use forest::{ForestConfig, RandomForest};
pub use logistic::{LogisticConfig, LogisticRegression};
pub use spec::ModelSpec;

use super::error::CotraderError;
use super::feature_table::{
    FORWARD_RETURN_COLUMN, FeatureRow, LABEL_COLUMN, OVERLAY_COLUMN, WEEK_COLUMN,
};

/// Columns that are never model inputs: labels, dates, identifiers, forward
/// returns and the execution overlay flag.
pub const EXCLUDED_COLUMNS: [&str; 8] = [
    LABEL_COLUMN,
    WEEK_COLUMN,
    "report_date",
    "market_name",
    "contract_code",
    FORWARD_RETURN_COLUMN,
    "return",
    OVERLAY_COLUMN,
];

/// A trainable binary classifier.
pub trait Classifier: Send {
    fn name(&self) -> &str;

    /// Fit on a row-major feature matrix and 0/1 labels.
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), CotraderError>;

    /// Predict a 0/1 class for each row.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, CotraderError>;
}

/// Produces an unfitted classifier for each retrain cycle.
pub trait ModelFactory: Sync {
    fn build(&self) -> Box<dyn Classifier>;
}

impl<F> ModelFactory for F
where
    F: Fn() -> Box<dyn Classifier> + Sync,
{
    fn build(&self) -> Box<dyn Classifier> {
        self()
    }
}

/// Selects feature columns and converts rows for a wrapped classifier.
pub struct ModelAdapter {
    classifier: Box<dyn Classifier>,
    excluded: Vec<String>,
}

impl ModelAdapter {
    pub fn new(classifier: Box<dyn Classifier>) -> Self {
        ModelAdapter {
            classifier,
            excluded: EXCLUDED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Exclude an extra column (e.g. a custom label or overlay column).
    pub fn excluding(mut self, column: &str) -> Self {
        if !self.excluded.iter().any(|c| c == column) {
            self.excluded.push(column.to_string());
        }
        self
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Indices of the columns fed to the classifier.
    pub fn feature_indices(&self, columns: &[String]) -> Vec<usize> {
        columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !self.excluded.contains(c))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn feature_names(&self, columns: &[String]) -> Vec<String> {
        self.feature_indices(columns)
            .into_iter()
            .map(|i| columns[i].clone())
            .collect()
    }

    pub fn fit(
        &mut self,
        columns: &[String],
        rows: &[FeatureRow],
        label_column: &str,
    ) -> Result<(), CotraderError> {
        let label_idx = columns
            .iter()
            .position(|c| c == label_column)
            .ok_or_else(|| CotraderError::missing_column(label_column))?;

        let y = rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row.values[label_idx] {
                v if v == 0.0 => Ok(0u8),
                v if v == 1.0 => Ok(1u8),
                v => Err(CotraderError::InvalidValue {
                    column: label_column.to_string(),
                    row: i,
                    reason: format!("label must be 0 or 1, got {}", v),
                }),
            })
            .collect::<Result<Vec<u8>, _>>()?;

        let x = self.design_matrix(columns, rows)?;
        self.classifier.fit(&x, &y)
    }

    pub fn predict(
        &self,
        columns: &[String],
        rows: &[FeatureRow],
    ) -> Result<Vec<u8>, CotraderError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.design_matrix(columns, rows)?;
        let predictions = self.classifier.predict(&x)?;
        if predictions.len() != rows.len() {
            return Err(CotraderError::model(format!(
                "{} returned {} predictions for {} rows",
                self.classifier.name(),
                predictions.len(),
                rows.len()
            )));
        }
        if let Some(bad) = predictions.iter().find(|&&p| p > 1) {
            return Err(CotraderError::model(format!(
                "{} predicted class {}, expected 0 or 1",
                self.classifier.name(),
                bad
            )));
        }
        Ok(predictions)
    }

    fn design_matrix(
        &self,
        columns: &[String],
        rows: &[FeatureRow],
    ) -> Result<Vec<Vec<f64>>, CotraderError> {
        let indices = self.feature_indices(columns);
        rows.iter()
            .enumerate()
            .map(|(r, row)| {
                indices
                    .iter()
                    .map(|&i| {
                        let v = row.values[i];
                        if v.is_finite() {
                            Ok(v)
                        } else {
                            Err(CotraderError::InvalidValue {
                                column: columns[i].clone(),
                                row: r,
                                reason: format!("non-finite feature value {}", v),
                            })
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// Standardisation statistics learned from training rows only.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Scaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Scaler {
    pub(crate) fn fit(x: &[Vec<f64>]) -> Self {
        let n_features = x.first().map_or(0, |r| r.len());
        let n = x.len().max(1) as f64;
        let means: Vec<f64> = (0..n_features)
            .map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let scales = (0..n_features)
            .map(|j| {
                let var = x.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd > 0.0 { sd } else { 1.0 }
            })
            .collect();
        Scaler { means, scales }
    }

    pub(crate) fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}
