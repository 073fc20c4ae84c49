//! Weekly COT positioning joined with the settlement price for that week.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use super::error::CotraderError;

/// Long/short contract counts for one trader category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Positions {
    pub long: u64,
    pub short: u64,
}

impl Positions {
    pub fn new(long: u64, short: u64) -> Self {
        Positions { long, short }
    }

    /// (long - short) / open_interest. The caller guarantees `open_interest > 0`.
    pub fn net_ratio(&self, open_interest: u64) -> f64 {
        (self.long as f64 - self.short as f64) / open_interest as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyRecord {
    pub week: NaiveDate,
    pub market_name: Option<String>,
    pub contract_code: Option<String>,
    pub open_interest: u64,
    pub money_manager: Positions,
    pub swap_dealer: Positions,
    pub producer_merchant: Positions,
    pub close: f64,
}

impl WeeklyRecord {
    /// Net ratios in (money manager, producer/merchant, swap dealer) order.
    pub fn net_ratios(&self) -> Result<[f64; 3], CotraderError> {
        if self.open_interest == 0 {
            return Err(CotraderError::ZeroOpenInterest { week: self.week });
        }
        Ok([
            self.money_manager.net_ratio(self.open_interest),
            self.producer_merchant.net_ratio(self.open_interest),
            self.swap_dealer.net_ratio(self.open_interest),
        ])
    }
}

/// Roll a report date forward to the Friday that closes its report week.
///
/// A Tuesday report lands on the Friday of the same week; a report that
/// already falls on a Friday rolls to the following Friday.
pub fn align_to_friday(date: NaiveDate) -> NaiveDate {
    let from_monday = date.weekday().num_days_from_monday() as i64;
    let friday = Weekday::Fri.num_days_from_monday() as i64;
    let mut ahead = (friday - from_monday).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    date + Duration::days(ahead)
}

/// Check that weeks are strictly increasing and prices are usable.
pub fn validate_series(records: &[WeeklyRecord]) -> Result<(), CotraderError> {
    for (i, record) in records.iter().enumerate() {
        if !(record.close.is_finite() && record.close > 0.0) {
            return Err(CotraderError::InvalidValue {
                column: "etf_close".into(),
                row: i,
                reason: format!("price must be positive, got {}", record.close),
            });
        }
        if i == 0 {
            continue;
        }
        let previous = records[i - 1].week;
        if record.week == previous {
            return Err(CotraderError::DuplicateWeek { week: record.week });
        }
        if record.week < previous {
            return Err(CotraderError::UnsortedSeries {
                index: i,
                previous,
                current: record.week,
            });
        }
    }
    Ok(())
}

/// Keep only records whose market name contains `market` (case-insensitive).
pub fn filter_market(records: Vec<WeeklyRecord>, market: &str) -> Vec<WeeklyRecord> {
    let needle = market.to_lowercase();
    records
        .into_iter()
        .filter(|r| {
            r.market_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect()
}
