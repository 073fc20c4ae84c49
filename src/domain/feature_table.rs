//! Week-indexed numeric feature table.
//!
//! Columns are named; every row carries one value per column plus the week
//! and optional market identifiers, which are never numeric features.

use chrono::NaiveDate;

use super::error::CotraderError;

pub const WEEK_COLUMN: &str = "week";
pub const PRICE_COLUMN: &str = "etf_close";
pub const LABEL_COLUMN: &str = "target_dir";
pub const FORWARD_RETURN_COLUMN: &str = "return_1w";
pub const OVERLAY_COLUMN: &str = "extreme_spec_long";
pub const MM_RATIO_COLUMN: &str = "mm_net_pct_oi";

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub week: NaiveDate,
    pub market_name: Option<String>,
    pub contract_code: Option<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>) -> Self {
        FeatureTable {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, checking its width against the header.
    pub fn push(&mut self, row: FeatureRow) -> Result<(), CotraderError> {
        if row.values.len() != self.columns.len() {
            return Err(CotraderError::InvalidValue {
                column: WEEK_COLUMN.into(),
                row: self.rows.len(),
                reason: format!(
                    "row has {} values, table has {} columns",
                    row.values.len(),
                    self.columns.len()
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, CotraderError> {
        self.column_index(name)
            .ok_or_else(|| CotraderError::missing_column(name))
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, CotraderError> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Return a copy with `name` set to `values`, appending the column if absent.
    pub fn with_column(&self, name: &str, values: &[f64]) -> Result<FeatureTable, CotraderError> {
        if values.len() != self.rows.len() {
            return Err(CotraderError::InvalidValue {
                column: name.into(),
                row: values.len().min(self.rows.len()),
                reason: format!(
                    "column has {} values, table has {} rows",
                    values.len(),
                    self.rows.len()
                ),
            });
        }
        let mut table = self.clone();
        match table.column_index(name) {
            Some(idx) => {
                for (row, &v) in table.rows.iter_mut().zip(values) {
                    row.values[idx] = v;
                }
            }
            None => {
                table.columns.push(name.to_string());
                for (row, &v) in table.rows.iter_mut().zip(values) {
                    row.values.push(v);
                }
            }
        }
        Ok(table)
    }
}
