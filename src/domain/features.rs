//! Feature builder: weekly COT + price records to a model-ready table.
//!
//! A week is emitted only once every rolling window covering it is full and
//! the following week's close is known; earlier and final weeks are dropped.

use super::error::CotraderError;
use super::feature_table::{
    FORWARD_RETURN_COLUMN, FeatureRow, FeatureTable, LABEL_COLUMN, PRICE_COLUMN,
};
use super::indicator::{
    IndicatorSeries, calculate_ema, calculate_macd, calculate_rsi, calculate_volatility,
};
use super::weekly::{WeeklyRecord, validate_series};
use crate::ports::event_port::EventSink;

/// Return columns accepted when attaching a classification target.
pub const RETURN_COLUMNS: [&str; 2] = [FORWARD_RETURN_COLUMN, "return"];

const RATIO_COLUMNS: [&str; 3] = ["mm_net_pct_oi", "pm_net_pct_oi", "sd_net_pct_oi"];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub label_threshold: f64,
    pub vol_window: usize,
    pub rsi_period: usize,
    pub ema_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            label_threshold: 0.0,
            vol_window: 26,
            rsi_period: 14,
            ema_period: 13,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

struct Indicators {
    volatility: IndicatorSeries,
    rsi: IndicatorSeries,
    ema: IndicatorSeries,
    macd: IndicatorSeries,
}

impl Indicators {
    fn compute(closes: &[f64], config: &FeatureConfig) -> Self {
        Indicators {
            volatility: calculate_volatility(closes, config.vol_window),
            rsi: calculate_rsi(closes, config.rsi_period),
            ema: calculate_ema(closes, config.ema_period),
            macd: calculate_macd(
                closes,
                config.macd_fast,
                config.macd_slow,
                config.macd_signal,
            ),
        }
    }

    fn columns(&self) -> [String; 4] {
        [
            self.volatility.indicator_type.to_string(),
            self.rsi.indicator_type.to_string(),
            self.ema.indicator_type.to_string(),
            self.macd.indicator_type.to_string(),
        ]
    }

    /// Indicator features at week `i`, or `None` while any window is warming up.
    fn at(&self, i: usize) -> Option<[f64; 4]> {
        let point = |s: &IndicatorSeries| s.values.get(i).and_then(|p| p.feature());
        Some([
            point(&self.volatility)?,
            point(&self.rsi)?,
            point(&self.ema)?,
            point(&self.macd)?,
        ])
    }
}

/// Build the feature table for one market's weekly series.
pub fn build_features(
    records: &[WeeklyRecord],
    config: &FeatureConfig,
    sink: &dyn EventSink,
) -> Result<FeatureTable, CotraderError> {
    validate_series(records)?;

    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();
    let indicators = Indicators::compute(&closes, config);

    let mut columns = vec![PRICE_COLUMN.to_string()];
    columns.extend(RATIO_COLUMNS.iter().map(|c| c.to_string()));
    columns.extend(RATIO_COLUMNS.iter().map(|c| format!("{}_chg_1w", c)));
    columns.extend(indicators.columns());
    columns.push(FORWARD_RETURN_COLUMN.to_string());
    columns.push(LABEL_COLUMN.to_string());

    let mut table = FeatureTable::new(columns);

    // The final week has no next close, so it never carries a label.
    for i in 1..records.len().saturating_sub(1) {
        let Some(technical) = indicators.at(i) else {
            continue;
        };
        let record = &records[i];
        let ratios = record.net_ratios()?;
        let previous = records[i - 1].net_ratios()?;
        let forward_return = closes[i + 1] / closes[i] - 1.0;
        let label = if forward_return > config.label_threshold {
            1.0
        } else {
            0.0
        };

        let mut values = Vec::with_capacity(table.columns.len());
        values.push(record.close);
        values.extend_from_slice(&ratios);
        values.extend(ratios.iter().zip(&previous).map(|(now, before)| now - before));
        values.extend_from_slice(&technical);
        values.push(forward_return);
        values.push(label);

        table.push(FeatureRow {
            week: record.week,
            market_name: record.market_name.clone(),
            contract_code: record.contract_code.clone(),
            values,
        })?;
    }

    sink.info(&format!(
        "built {} feature rows from {} weeks ({} dropped for lookback or missing label)",
        table.len(),
        records.len(),
        records.len() - table.len()
    ));

    Ok(table)
}

/// Attach (or overwrite) the binary direction target: `return > threshold`.
///
/// Uses `return_1w` when present, otherwise `return`.
pub fn add_classification_target(
    table: &FeatureTable,
    threshold: f64,
) -> Result<FeatureTable, CotraderError> {
    let return_column = RETURN_COLUMNS
        .iter()
        .find(|c| table.column_index(c).is_some())
        .ok_or_else(|| CotraderError::missing_column(&RETURN_COLUMNS.join("` or `")))?;

    let targets: Vec<f64> = table
        .column(return_column)?
        .iter()
        .map(|&r| if r > threshold { 1.0 } else { 0.0 })
        .collect();

    table.with_column(LABEL_COLUMN, &targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::weekly::Positions;
    use crate::ports::event_port::NullSink;
    use chrono::{Duration, NaiveDate};

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            label_threshold: 0.0,
            vol_window: 2,
            rsi_period: 2,
            ema_period: 2,
            macd_fast: 2,
            macd_slow: 3,
            macd_signal: 2,
        }
    }

    fn records(closes: &[f64]) -> Vec<WeeklyRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| WeeklyRecord {
                week: start + Duration::weeks(i as i64),
                market_name: None,
                contract_code: Some("088691".into()),
                open_interest: 100,
                money_manager: Positions::new(10 + i as u64, 5),
                swap_dealer: Positions::new(6, 2),
                producer_merchant: Positions::new(8, 3 + i as u64),
                close,
            })
            .collect()
    }

    #[test]
    fn drops_warmup_and_final_week() {
        let recs = records(&[50.0, 51.0, 52.0, 51.0, 53.0, 54.0, 55.0]);
        let table = build_features(&recs, &small_config(), &NullSink).unwrap();

        // MACD(2,3,2) is the longest window: first valid index 3.
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0].week, recs[3].week);
        assert_eq!(table.rows.last().unwrap().week, recs[5].week);
    }

    #[test]
    fn column_layout() {
        let recs = records(&[50.0, 51.0, 52.0, 51.0, 53.0, 54.0]);
        let table = build_features(&recs, &FeatureConfig::default(), &NullSink).unwrap();
        assert_eq!(
            table.columns,
            vec![
                "etf_close",
                "mm_net_pct_oi",
                "pm_net_pct_oi",
                "sd_net_pct_oi",
                "mm_net_pct_oi_chg_1w",
                "pm_net_pct_oi_chg_1w",
                "sd_net_pct_oi_chg_1w",
                "vol_26w",
                "rsi_14",
                "ema_13",
                "macd_hist",
                "return_1w",
                "target_dir",
            ]
        );
        // Not enough history for the default windows.
        assert!(table.is_empty());
    }

    #[test]
    fn ratios_deltas_and_label() {
        let recs = records(&[50.0, 51.0, 52.0, 51.0, 53.0, 54.0, 55.0]);
        let table = build_features(&recs, &small_config(), &NullSink).unwrap();
        let row = &table.rows[0];

        let mm = table.column_index("mm_net_pct_oi").unwrap();
        let mm_chg = table.column_index("mm_net_pct_oi_chg_1w").unwrap();
        let pm_chg = table.column_index("pm_net_pct_oi_chg_1w").unwrap();
        let ret = table.column_index("return_1w").unwrap();
        let label = table.column_index("target_dir").unwrap();

        assert!((row.values[mm] - 0.08).abs() < 1e-12);
        assert!((row.values[mm_chg] - 0.01).abs() < 1e-12);
        assert!((row.values[pm_chg] + 0.01).abs() < 1e-12);
        assert!((row.values[ret] - (53.0 / 51.0 - 1.0)).abs() < 1e-12);
        assert_eq!(row.values[label], 1.0);
    }

    #[test]
    fn label_threshold_is_strict() {
        let recs = records(&[50.0, 51.0, 52.0, 51.0, 51.0, 54.0, 55.0]);
        let table = build_features(&recs, &small_config(), &NullSink).unwrap();
        let label = table.column_index("target_dir").unwrap();
        // week 3 -> week 4 return is exactly zero
        assert_eq!(table.rows[0].values[label], 0.0);
    }

    #[test]
    fn default_windows_start_at_macd_signal_warmup() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i % 5) as f64).collect();
        let recs = records(&closes);
        let table = build_features(&recs, &FeatureConfig::default(), &NullSink).unwrap();

        // MACD(12,26,9) needs 25 + 8 weeks; volatility(26) and RSI(14) are ready earlier.
        assert_eq!(table.rows[0].week, recs[33].week);
        assert_eq!(table.rows.last().unwrap().week, recs[38].week);
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn zero_open_interest_on_retained_row_fails() {
        let mut recs = records(&[50.0, 51.0, 52.0, 51.0, 53.0, 54.0, 55.0]);
        recs[4].open_interest = 0;
        let err = build_features(&recs, &small_config(), &NullSink).unwrap_err();
        assert!(matches!(err, CotraderError::ZeroOpenInterest { week } if week == recs[4].week));
    }

    #[test]
    fn zero_open_interest_in_dropped_warmup_is_ignored() {
        let mut recs = records(&[50.0, 51.0, 52.0, 51.0, 53.0, 54.0, 55.0]);
        recs[0].open_interest = 0;
        assert!(build_features(&recs, &small_config(), &NullSink).is_ok());
    }

    #[test]
    fn unsorted_input_fails() {
        let mut recs = records(&[50.0, 51.0, 52.0]);
        recs.swap(0, 1);
        assert!(matches!(
            build_features(&recs, &small_config(), &NullSink),
            Err(CotraderError::UnsortedSeries { .. })
        ));
    }

    #[test]
    fn classification_target_prefers_return_1w() {
        let mut table = FeatureTable::new(vec!["return".into(), "return_1w".into()]);
        table
            .push(FeatureRow {
                week: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                market_name: None,
                contract_code: None,
                values: vec![-1.0, 0.05],
            })
            .unwrap();
        let out = add_classification_target(&table, 0.0).unwrap();
        assert_eq!(out.column("target_dir").unwrap(), vec![1.0]);
    }

    #[test]
    fn classification_target_requires_return_column() {
        let table = FeatureTable::new(vec!["other".into()]);
        assert!(matches!(
            add_classification_target(&table, 0.0),
            Err(CotraderError::MissingColumn { .. })
        ));
    }
}
