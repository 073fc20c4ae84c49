//! Test-start checkpoints at a fixed frequency.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};

/// Spacing between checkpoints: `<n>W`, `<n>M` (month ends) or `<n>D`.
///
/// Day and week steps count from the start date itself, so a Friday start
/// yields Fridays. They are not anchored to a weekday the way pandas `W`
/// (Sunday) offsets are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Days(u32),
    Weeks(u32),
    MonthEnds(u32),
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::MonthEnds(6)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(unit) = s.chars().last() else {
            return Err("empty frequency".to_string());
        };
        let digits = &s[..s.len() - unit.len_utf8()];
        let n: u32 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| format!("invalid frequency count in '{}'", s))?
        };
        if n == 0 {
            return Err(format!("frequency '{}' must be at least 1", s));
        }
        match unit.to_ascii_uppercase() {
            'D' => Ok(Frequency::Days(n)),
            'W' => Ok(Frequency::Weeks(n)),
            'M' => Ok(Frequency::MonthEnds(n)),
            _ => Err(format!(
                "unknown frequency unit in '{}' (expected D, W or M)",
                s
            )),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Days(n) => write!(f, "{}D", n),
            Frequency::Weeks(n) => write!(f, "{}W", n),
            Frequency::MonthEnds(n) => write!(f, "{}M", n),
        }
    }
}

fn month_end(year: i32, month: u32, offset: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first
        .checked_add_months(Months::new(offset + 1))?
        .pred_opt()
}

/// Checkpoints from `start` to `end` inclusive, strictly increasing.
///
/// Day and week frequencies step from `start` itself; month frequencies use
/// calendar month ends, the first being the end of `start`'s month.
pub fn generate_checkpoints(start: NaiveDate, end: NaiveDate, freq: Frequency) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    match freq {
        Frequency::Days(n) | Frequency::Weeks(n) => {
            let step = match freq {
                Frequency::Weeks(_) => Duration::weeks(i64::from(n)),
                _ => Duration::days(i64::from(n)),
            };
            let mut current = start;
            while current <= end {
                out.push(current);
                match current.checked_add_signed(step) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        Frequency::MonthEnds(n) => {
            let mut k = 0;
            while let Some(date) = month_end(start.year(), start.month(), k) {
                if date > end {
                    break;
                }
                out.push(date);
                k += n;
            }
        }
    }
    out
}
