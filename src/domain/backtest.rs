//! Backtest engine: one retrain, predict and simulate cycle per checkpoint.
//!
//! A cycle is stateless. It fits a fresh classifier on the train rows of a
//! [`Split`], turns test predictions into positions, and compounds the
//! commission-adjusted weekly returns. The last test row has no exit price
//! inside the window, so its signal is reported as pending instead of traded.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::CotraderError;
use super::feature_table::{
    FeatureRow, FeatureTable, LABEL_COLUMN, OVERLAY_COLUMN, PRICE_COLUMN,
};
use super::metrics::Metrics;
use super::model::{ModelAdapter, ModelFactory};
use super::overlay::OverlayPolicy;
use super::split::{self, Split};
use crate::ports::event_port::EventSink;

pub const DEFAULT_COMMISSION: f64 = 0.0005;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Charged once on entry and once on exit of every held week.
    pub commission_per_trade: f64,
    pub allow_shorts: bool,
    pub charge_commission_on_flat: bool,
    pub overlay_policy: OverlayPolicy,
    pub overlay_column: String,
    pub price_column: String,
    pub label_column: String,
    pub purge_weeks: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            commission_per_trade: DEFAULT_COMMISSION,
            allow_shorts: false,
            charge_commission_on_flat: false,
            overlay_policy: OverlayPolicy::Flip,
            overlay_column: OVERLAY_COLUMN.to_string(),
            price_column: PRICE_COLUMN.to_string(),
            label_column: LABEL_COLUMN.to_string(),
            purge_weeks: 0,
        }
    }
}

/// One realized test week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeResult {
    pub week: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub signal: i8,
    pub strategy_ret: f64,
    pub cum_return: f64,
}

/// Position the model wants for the final test week, not yet realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSignal {
    pub week: NaiveDate,
    pub signal: i8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub checkpoint: NaiveDate,
    pub train_rows: usize,
    pub trades: Vec<TradeResult>,
    pub pending: Option<PendingSignal>,
    pub metrics: Metrics,
}

impl BacktestRun {
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn signals(&self) -> Vec<i8> {
        self.trades.iter().map(|t| t.signal).collect()
    }
}

/// Map a 0/1 prediction to a position before any overlay.
pub fn base_signal(prediction: u8, allow_shorts: bool) -> i8 {
    match (prediction, allow_shorts) {
        (1, _) => 1,
        (_, true) => -1,
        (_, false) => 0,
    }
}

/// Realize every test row that has a following row to exit on.
///
/// `signals` holds one position per row in `rows`.
pub fn simulate(
    rows: &[FeatureRow],
    signals: &[i8],
    price_idx: usize,
    config: &BacktestConfig,
) -> Result<Vec<TradeResult>, CotraderError> {
    if signals.len() != rows.len() {
        return Err(CotraderError::model(format!(
            "{} signals for {} test rows",
            signals.len(),
            rows.len()
        )));
    }

    let round_trip = 2.0 * config.commission_per_trade;
    let mut cum = 1.0_f64;
    let mut trades = Vec::with_capacity(rows.len().saturating_sub(1));

    for (i, pair) in rows.windows(2).enumerate() {
        let entry_price = price_at(&pair[0], price_idx, &config.price_column, i)?;
        let exit_price = price_at(&pair[1], price_idx, &config.price_column, i + 1)?;
        let signal = signals[i];

        let raw = (exit_price - entry_price) / entry_price;
        let cost = if signal != 0 || config.charge_commission_on_flat {
            round_trip
        } else {
            0.0
        };
        // a position cannot lose more than its stake
        let strategy_ret = (raw * f64::from(signal) - cost).max(-1.0);
        cum *= 1.0 + strategy_ret;

        trades.push(TradeResult {
            week: pair[0].week,
            entry_price,
            exit_price,
            signal,
            strategy_ret,
            cum_return: cum,
        });
    }
    Ok(trades)
}

fn price_at(row: &FeatureRow, idx: usize, column: &str, pos: usize) -> Result<f64, CotraderError> {
    let price = row.values[idx];
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(CotraderError::InvalidValue {
            column: column.to_string(),
            row: pos,
            reason: format!("price must be positive, got {}", price),
        })
    }
}

/// Run one cycle over an already-split window.
pub fn run_cycle(
    split: Split<'_>,
    factory: &dyn ModelFactory,
    config: &BacktestConfig,
    sink: &dyn EventSink,
) -> Result<BacktestRun, CotraderError> {
    let split = split.purged(config.purge_weeks);
    let checkpoint = split.checkpoint;
    if split.train.is_empty() {
        return Err(CotraderError::EmptyTrainSet { checkpoint });
    }

    let column = |name: &str| {
        split
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CotraderError::missing_column(name))
    };
    let price_idx = column(&config.price_column)?;
    column(&config.label_column)?;
    let overlay_idx = split.columns.iter().position(|c| *c == config.overlay_column);

    if split.test.is_empty() {
        sink.info(&format!(
            "checkpoint {}: no test rows, nothing to trade",
            checkpoint
        ));
        return Ok(BacktestRun {
            checkpoint,
            train_rows: split.train.len(),
            trades: Vec::new(),
            pending: None,
            metrics: Metrics::empty(),
        });
    }

    let mut adapter = ModelAdapter::new(factory.build())
        .excluding(&config.label_column)
        .excluding(&config.overlay_column);
    adapter.fit(split.columns, split.train, &config.label_column)?;
    let predictions = adapter.predict(split.columns, split.test)?;

    let signals: Vec<i8> = split
        .test
        .iter()
        .zip(&predictions)
        .map(|(row, &p)| {
            let flagged = overlay_idx.is_some_and(|i| row.values[i] > 0.0);
            config
                .overlay_policy
                .apply(base_signal(p, config.allow_shorts), flagged)
        })
        .collect();

    let trades = simulate(split.test, &signals, price_idx, config)?;
    let pending = split.test.last().zip(signals.last()).map(|(row, &signal)| PendingSignal {
        week: row.week,
        signal,
    });

    let returns: Vec<f64> = trades.iter().map(|t| t.strategy_ret).collect();
    let metrics = Metrics::compute(&returns);

    if trades.is_empty() {
        sink.info(&format!(
            "checkpoint {}: single test row, no realized weeks",
            checkpoint
        ));
    } else {
        sink.info(&format!(
            "checkpoint {}: {} {} train rows, {} weeks, cum_return {:.4}, sharpe {:.3}, max_drawdown {:.4}",
            checkpoint,
            adapter.classifier_name(),
            split.train.len(),
            trades.len(),
            metrics.cum_return,
            metrics.sharpe,
            metrics.max_drawdown
        ));
    }

    Ok(BacktestRun {
        checkpoint,
        train_rows: split.train.len(),
        trades,
        pending,
        metrics,
    })
}

/// Split `table` at `checkpoint` and trade everything from it to the end of data.
pub fn run_backtest(
    table: &FeatureTable,
    checkpoint: NaiveDate,
    factory: &dyn ModelFactory,
    config: &BacktestConfig,
    sink: &dyn EventSink,
) -> Result<BacktestRun, CotraderError> {
    run_cycle(split::split(table, checkpoint)?, factory, config, sink)
}
