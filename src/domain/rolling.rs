//! Rolling evaluation driver: the engine swept over checkpoints and overlay
//! thresholds, one summary row per cycle.
//!
//! Rows come out threshold-major, checkpoint-minor. Cycles share nothing, so
//! they run on the rayon pool when `parallel` is set; the indexed collect
//! keeps the canonical order either way.

use chrono::NaiveDate;
use rayon::prelude::*;

use super::backtest::{self, BacktestConfig, BacktestRun};
use super::error::CotraderError;
use super::feature_table::{FeatureTable, MM_RATIO_COLUMN, OVERLAY_COLUMN};
use super::model::ModelFactory;
use super::overlay;
use super::split;
use crate::ports::event_port::EventSink;

pub const DEFAULT_THRESHOLDS: [f64; 1] = [0.90];

#[derive(Debug, Clone, PartialEq)]
pub struct RollingConfig {
    pub backtest: BacktestConfig,
    /// Column whose full-history quantile sets the overlay cut.
    pub ratio_column: String,
    /// End each test window at the next checkpoint instead of the end of data.
    pub bounded: bool,
    pub parallel: bool,
}

impl Default for RollingConfig {
    fn default() -> Self {
        RollingConfig {
            backtest: BacktestConfig::default(),
            ratio_column: MM_RATIO_COLUMN.to_string(),
            bounded: true,
            parallel: true,
        }
    }
}

/// One row of the rolling summary. Metrics are NaN when the cycle produced
/// no realized weeks or failed.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryMetric {
    pub threshold: Option<f64>,
    pub test_start: NaiveDate,
    pub cum_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    /// Why the cycle failed, if it did.
    pub failure: Option<String>,
}

impl SummaryMetric {
    fn from_run(threshold: Option<f64>, run: &BacktestRun) -> Self {
        if run.is_empty() {
            return Self::missing(threshold, run.checkpoint, None);
        }
        SummaryMetric {
            threshold,
            test_start: run.checkpoint,
            cum_return: run.metrics.cum_return,
            sharpe: run.metrics.sharpe,
            max_drawdown: run.metrics.max_drawdown,
            failure: None,
        }
    }

    fn missing(threshold: Option<f64>, test_start: NaiveDate, failure: Option<String>) -> Self {
        SummaryMetric {
            threshold,
            test_start,
            cum_return: f64::NAN,
            sharpe: f64::NAN,
            max_drawdown: f64::NAN,
            failure,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.cum_return.is_nan()
    }
}

struct Variant {
    threshold: Option<f64>,
    table: FeatureTable,
}

fn check_checkpoints(checkpoints: &[NaiveDate]) -> Result<(), CotraderError> {
    for (i, pair) in checkpoints.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(CotraderError::InvalidValue {
                column: "test_start".into(),
                row: i + 1,
                reason: format!("checkpoint {} does not follow {}", pair[1], pair[0]),
            });
        }
    }
    Ok(())
}

/// Sweep `thresholds × checkpoints`. An empty threshold list runs once with
/// the table's overlay column as given.
///
/// Schema problems abort the sweep before any cycle runs; failures inside a
/// cycle become NaN rows and are reported as warnings.
pub fn run_rolling(
    table: &FeatureTable,
    factory: &dyn ModelFactory,
    checkpoints: &[NaiveDate],
    thresholds: &[f64],
    config: &RollingConfig,
    sink: &dyn EventSink,
) -> Result<Vec<SummaryMetric>, CotraderError> {
    split::ensure_sorted(&table.rows)?;
    check_checkpoints(checkpoints)?;
    table.require_column(&config.backtest.price_column)?;
    table.require_column(&config.backtest.label_column)?;

    let variants: Vec<Variant> = if thresholds.is_empty() {
        vec![Variant {
            threshold: None,
            table: table.clone(),
        }]
    } else {
        thresholds
            .iter()
            .map(|&q| {
                let mut flagged = overlay::flag_extremes(table, &config.ratio_column, q)?;
                if config.backtest.overlay_column != OVERLAY_COLUMN {
                    let flags = flagged.column(OVERLAY_COLUMN)?;
                    flagged = flagged.with_column(&config.backtest.overlay_column, &flags)?;
                }
                Ok(Variant {
                    threshold: Some(q),
                    table: flagged,
                })
            })
            .collect::<Result<_, CotraderError>>()?
    };

    let jobs: Vec<(usize, usize)> = (0..variants.len())
        .flat_map(|v| (0..checkpoints.len()).map(move |c| (v, c)))
        .collect();

    let evaluate = |&(v, c): &(usize, usize)| {
        let variant = &variants[v];
        let checkpoint = checkpoints[c];
        let next = if config.bounded {
            checkpoints.get(c + 1).copied()
        } else {
            None
        };
        let outcome = split::split(&variant.table, checkpoint).and_then(|s| {
            backtest::run_cycle(s.bounded(next), factory, &config.backtest, sink)
        });
        match outcome {
            Ok(run) => SummaryMetric::from_run(variant.threshold, &run),
            Err(err) => {
                sink.warn(&format!(
                    "checkpoint {}{}: cycle failed: {}",
                    checkpoint,
                    variant
                        .threshold
                        .map(|q| format!(" (threshold {})", q))
                        .unwrap_or_default(),
                    err
                ));
                SummaryMetric::missing(variant.threshold, checkpoint, Some(err.to_string()))
            }
        }
    };

    let rows: Vec<SummaryMetric> = if config.parallel {
        jobs.par_iter().map(evaluate).collect()
    } else {
        jobs.iter().map(evaluate).collect()
    };

    let failed = rows.iter().filter(|r| r.failure.is_some()).count();
    let empty = rows.iter().filter(|r| r.is_missing()).count() - failed;
    sink.info(&format!(
        "rolling evaluation: {} cycles, {} failed, {} without realized weeks",
        rows.len(),
        failed,
        empty
    ));
    Ok(rows)
}
