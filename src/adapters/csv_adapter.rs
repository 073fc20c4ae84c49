//! CSV file adapters: weekly/feature input and trade/summary output.
//!
//! Columns are looked up by header name. Empty numeric cells read as NaN and
//! NaN is written back as an empty cell.

use crate::domain::backtest::BacktestRun;
use crate::domain::error::CotraderError;
use crate::domain::feature_table::{FeatureRow, FeatureTable, PRICE_COLUMN, WEEK_COLUMN};
use crate::domain::rolling::SummaryMetric;
use crate::domain::weekly::{Positions, WeeklyRecord, align_to_friday};
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::path::{Path, PathBuf};

const REPORT_DATE_COLUMN: &str = "report_date";
const MARKET_COLUMN: &str = "market_name";
const CONTRACT_COLUMN: &str = "contract_code";

/// Non-numeric columns carried alongside the feature values.
const IDENTIFIER_COLUMNS: [&str; 4] = [
    WEEK_COLUMN,
    REPORT_DATE_COLUMN,
    MARKET_COLUMN,
    CONTRACT_COLUMN,
];

/// Reads one CSV file as weekly records or as a feature table.
pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn reader(&self) -> Result<csv::Reader<std::fs::File>, CotraderError> {
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| CotraderError::Csv {
                reason: format!("failed to read {}: {}", self.path.display(), e),
            })
    }
}

struct Header {
    names: Vec<String>,
}

impl Header {
    fn new(record: &StringRecord) -> Self {
        Header {
            names: record.iter().map(|h| h.to_string()).collect(),
        }
    }

    fn find(&self, candidates: &[&str]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|c| self.names.iter().position(|n| n == c))
    }

    fn require(&self, name: &str) -> Result<usize, CotraderError> {
        self.find(&[name])
            .ok_or_else(|| CotraderError::missing_column(name))
    }
}

fn cell<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("")
}

fn optional_text(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.map(|i| cell(record, i))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_date(value: &str, column: &str, row: usize) -> Result<NaiveDate, CotraderError> {
    // pandas writes datetimes as "YYYY-MM-DD" or "YYYY-MM-DD 00:00:00"
    let date_part = value.split([' ', 'T']).next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| CotraderError::InvalidValue {
        column: column.to_string(),
        row,
        reason: format!("'{}' is not an ISO date", value),
    })
}

fn parse_f64(value: &str, column: &str, row: usize) -> Result<f64, CotraderError> {
    if value.is_empty() {
        return Ok(f64::NAN);
    }
    value.parse().map_err(|_| CotraderError::InvalidValue {
        column: column.to_string(),
        row,
        reason: format!("'{}' is not a number", value),
    })
}

fn parse_count(value: &str, column: &str, row: usize) -> Result<u64, CotraderError> {
    let invalid = || CotraderError::InvalidValue {
        column: column.to_string(),
        row,
        reason: format!("'{}' is not a non-negative count", value),
    };
    if let Ok(n) = value.parse::<u64>() {
        return Ok(n);
    }
    let f: f64 = value.parse().map_err(|_| invalid())?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 {
        Ok(f as u64)
    } else {
        Err(invalid())
    }
}

impl DataPort for CsvAdapter {
    fn load_weekly(&self) -> Result<Vec<WeeklyRecord>, CotraderError> {
        let mut rdr = self.reader()?;
        let header = Header::new(rdr.headers()?);

        let (date_idx, date_column, align) = match header.find(&[WEEK_COLUMN]) {
            Some(i) => (i, WEEK_COLUMN, false),
            None => {
                let i = header
                    .find(&[REPORT_DATE_COLUMN])
                    .ok_or_else(|| CotraderError::missing_column(WEEK_COLUMN))?;
                (i, REPORT_DATE_COLUMN, true)
            }
        };
        let close_idx = header
            .find(&[PRICE_COLUMN, "close"])
            .ok_or_else(|| CotraderError::missing_column(PRICE_COLUMN))?;
        let oi_idx = header.require("open_interest")?;
        let mut count_columns = Vec::with_capacity(6);
        for name in ["mm_long", "mm_short", "pm_long", "pm_short", "sd_long", "sd_short"] {
            count_columns.push((name, header.require(name)?));
        }
        let market_idx = header.find(&[MARKET_COLUMN]);
        let contract_idx = header.find(&[CONTRACT_COLUMN]);

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let date = parse_date(cell(&record, date_idx), date_column, row)?;
            let counts = count_columns
                .iter()
                .map(|&(name, i)| parse_count(cell(&record, i), name, row))
                .collect::<Result<Vec<u64>, _>>()?;

            records.push(WeeklyRecord {
                week: if align { align_to_friday(date) } else { date },
                market_name: optional_text(&record, market_idx),
                contract_code: optional_text(&record, contract_idx),
                open_interest: parse_count(cell(&record, oi_idx), "open_interest", row)?,
                money_manager: Positions::new(counts[0], counts[1]),
                producer_merchant: Positions::new(counts[2], counts[3]),
                swap_dealer: Positions::new(counts[4], counts[5]),
                close: parse_f64(cell(&record, close_idx), PRICE_COLUMN, row)?,
            });
        }
        Ok(records)
    }

    fn load_features(&self) -> Result<FeatureTable, CotraderError> {
        let mut rdr = self.reader()?;
        let header = Header::new(rdr.headers()?);
        let week_idx = header.require(WEEK_COLUMN)?;
        let market_idx = header.find(&[MARKET_COLUMN]);
        let contract_idx = header.find(&[CONTRACT_COLUMN]);

        let numeric: Vec<(usize, String)> = header
            .names
            .iter()
            .enumerate()
            .filter(|(_, n)| !IDENTIFIER_COLUMNS.contains(&n.as_str()))
            .map(|(i, n)| (i, n.clone()))
            .collect();

        let mut table = FeatureTable::new(numeric.iter().map(|(_, n)| n.clone()).collect());
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            let values = numeric
                .iter()
                .map(|(i, name)| parse_f64(cell(&record, *i), name, row))
                .collect::<Result<Vec<f64>, _>>()?;
            table.push(FeatureRow {
                week: parse_date(cell(&record, week_idx), WEEK_COLUMN, row)?,
                market_name: optional_text(&record, market_idx),
                contract_code: optional_text(&record, contract_idx),
                values,
            })?;
        }
        Ok(table)
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() { String::new() } else { v.to_string() }
}

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>, CotraderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    csv::Writer::from_path(path).map_err(|e| CotraderError::Csv {
        reason: format!("failed to create {}: {}", path.display(), e),
    })
}

/// Writes pipeline outputs as CSV files.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportWriter;

impl ReportPort for CsvReportWriter {
    fn write_features(&self, table: &FeatureTable, path: &Path) -> Result<(), CotraderError> {
        let with_market = table.rows.iter().any(|r| r.market_name.is_some());
        let with_contract = table.rows.iter().any(|r| r.contract_code.is_some());

        let mut wtr = writer(path)?;
        let mut header = vec![WEEK_COLUMN.to_string()];
        if with_market {
            header.push(MARKET_COLUMN.to_string());
        }
        if with_contract {
            header.push(CONTRACT_COLUMN.to_string());
        }
        header.extend(table.columns.iter().cloned());
        wtr.write_record(&header)?;

        for row in &table.rows {
            let mut record = vec![row.week.to_string()];
            if with_market {
                record.push(row.market_name.clone().unwrap_or_default());
            }
            if with_contract {
                record.push(row.contract_code.clone().unwrap_or_default());
            }
            record.extend(row.values.iter().map(|&v| format_value(v)));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_trades(&self, run: &BacktestRun, path: &Path) -> Result<(), CotraderError> {
        let mut wtr = writer(path)?;
        if run.trades.is_empty() {
            wtr.write_record([
                "week",
                "entry_price",
                "exit_price",
                "signal",
                "strategy_ret",
                "cum_return",
            ])?;
        }
        for trade in &run.trades {
            wtr.serialize(trade)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_summary(&self, rows: &[SummaryMetric], path: &Path) -> Result<(), CotraderError> {
        let with_threshold = rows.iter().any(|r| r.threshold.is_some());
        let mut wtr = writer(path)?;

        let mut header = Vec::with_capacity(5);
        if with_threshold {
            header.push("threshold");
        }
        header.extend(["test_start", "cum_return", "sharpe", "max_drawdown"]);
        wtr.write_record(&header)?;

        for row in rows {
            let mut record = Vec::with_capacity(5);
            if with_threshold {
                record.push(row.threshold.map(format_value).unwrap_or_default());
            }
            record.push(row.test_start.to_string());
            record.push(format_value(row.cum_return));
            record.push(format_value(row.sharpe));
            record.push(format_value(row.max_drawdown));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
