//! Contrarian overlay: flag weeks where speculative positioning is extreme.

use std::fmt;
use std::str::FromStr;

use super::error::CotraderError;
use super::feature_table::{FeatureTable, OVERLAY_COLUMN};

/// What a flagged week does to the model's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayPolicy {
    /// Invert the position.
    #[default]
    Flip,
    /// Stand aside.
    Flatten,
}

impl OverlayPolicy {
    pub fn apply(self, signal: i8, flagged: bool) -> i8 {
        match (flagged, self) {
            (false, _) => signal,
            (true, OverlayPolicy::Flip) => -signal,
            (true, OverlayPolicy::Flatten) => 0,
        }
    }
}

impl fmt::Display for OverlayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayPolicy::Flip => write!(f, "flip"),
            OverlayPolicy::Flatten => write!(f, "flatten"),
        }
    }
}

impl FromStr for OverlayPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flip" => Ok(OverlayPolicy::Flip),
            "flatten" => Ok(OverlayPolicy::Flatten),
            other => Err(format!(
                "unknown overlay policy '{}' (expected flip or flatten)",
                other
            )),
        }
    }
}

/// Quantile with linear interpolation between order statistics.
/// Non-finite values are ignored; `None` when nothing is left.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Set the overlay column to 1.0 where `ratio_column >= quantile(q)` over the
/// whole table, 0.0 elsewhere.
pub fn flag_extremes(
    table: &FeatureTable,
    ratio_column: &str,
    q: f64,
) -> Result<FeatureTable, CotraderError> {
    let ratios = table.column(ratio_column)?;
    let flags: Vec<f64> = match quantile(&ratios, q) {
        Some(cut) => ratios.iter().map(|&v| f64::from(u8::from(v >= cut))).collect(),
        None => vec![0.0; ratios.len()],
    };
    table.with_column(OVERLAY_COLUMN, &flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feature_table::FeatureRow;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn ratio_table(values: &[f64]) -> FeatureTable {
        let mut table = FeatureTable::new(vec!["mm_net_pct_oi".into()]);
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        for (i, v) in values.iter().enumerate() {
            table
                .push(FeatureRow {
                    week: start + Duration::weeks(i as i64),
                    market_name: None,
                    contract_code: None,
                    values: vec![*v],
                })
                .unwrap();
        }
        table
    }

    #[test]
    fn quantile_interpolates() {
        let q = quantile(&[0.1, 0.2, 0.9, 0.3], 0.9).unwrap();
        assert_relative_eq!(q, 0.72, epsilon = 1e-12);
        assert_relative_eq!(quantile(&[5.0, 1.0, 3.0], 0.5).unwrap(), 3.0);
        assert_relative_eq!(quantile(&[5.0, 1.0, 3.0], 1.0).unwrap(), 5.0);
        assert_relative_eq!(quantile(&[5.0, 1.0, 3.0], 0.0).unwrap(), 1.0);
    }

    #[test]
    fn quantile_of_nothing() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[f64::NAN], 0.5), None);
    }

    #[test]
    fn flags_top_decile() {
        let table = flag_extremes(&ratio_table(&[0.1, 0.2, 0.9, 0.3]), "mm_net_pct_oi", 0.9).unwrap();
        assert_eq!(table.column(OVERLAY_COLUMN).unwrap(), vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn reflagging_replaces_column() {
        let once = flag_extremes(&ratio_table(&[0.1, 0.2, 0.9, 0.3]), "mm_net_pct_oi", 0.9).unwrap();
        let twice = flag_extremes(&once, "mm_net_pct_oi", 0.5).unwrap();
        assert_eq!(twice.columns.len(), 2);
        assert_eq!(twice.column(OVERLAY_COLUMN).unwrap(), vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn missing_ratio_column() {
        let err = flag_extremes(&ratio_table(&[0.1]), "pm_net_pct_oi", 0.9).unwrap_err();
        assert!(matches!(err, CotraderError::MissingColumn { .. }));
    }

    #[test]
    fn policy_semantics() {
        assert_eq!(OverlayPolicy::Flip.apply(1, true), -1);
        assert_eq!(OverlayPolicy::Flip.apply(-1, true), 1);
        assert_eq!(OverlayPolicy::Flatten.apply(1, true), 0);
        assert_eq!(OverlayPolicy::Flatten.apply(1, false), 1);
        assert_eq!("FLATTEN".parse::<OverlayPolicy>(), Ok(OverlayPolicy::Flatten));
        assert!("invert".parse::<OverlayPolicy>().is_err());
    }
}
