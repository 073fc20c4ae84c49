//! Report output port trait.

use crate::domain::backtest::BacktestRun;
use crate::domain::error::CotraderError;
use crate::domain::feature_table::FeatureTable;
use crate::domain::rolling::SummaryMetric;
use std::path::Path;

/// Port for writing pipeline outputs.
pub trait ReportPort {
    fn write_features(&self, table: &FeatureTable, path: &Path) -> Result<(), CotraderError>;

    fn write_trades(&self, run: &BacktestRun, path: &Path) -> Result<(), CotraderError>;

    fn write_summary(&self, rows: &[SummaryMetric], path: &Path) -> Result<(), CotraderError>;
}
