//! Configuration loading and validation.
//!
//! Typed configs are read from a [`ConfigPort`] with defaults for absent
//! keys, CLI flags are layered on top by the caller, and the merged value is
//! validated before any run starts.

use chrono::NaiveDate;

use crate::domain::backtest::BacktestConfig;
use crate::domain::checkpoint::Frequency;
use crate::domain::error::CotraderError;
use crate::domain::features::FeatureConfig;
use crate::domain::overlay::OverlayPolicy;
use crate::domain::rolling::{DEFAULT_THRESHOLDS, RollingConfig};
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> CotraderError {
    CotraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, CotraderError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| invalid(section, key, format!("{} must be non-negative", key)))
}

fn get_string_or(config: &dyn ConfigPort, section: &str, key: &str, default: &str) -> String {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn load_feature_config(config: &dyn ConfigPort) -> Result<FeatureConfig, CotraderError> {
    let d = FeatureConfig::default();
    Ok(FeatureConfig {
        label_threshold: config.get_double("features", "label_threshold", d.label_threshold),
        vol_window: get_usize(config, "features", "vol_window", d.vol_window)?,
        rsi_period: get_usize(config, "features", "rsi_period", d.rsi_period)?,
        ema_period: get_usize(config, "features", "ema_period", d.ema_period)?,
        macd_fast: get_usize(config, "features", "macd_fast", d.macd_fast)?,
        macd_slow: get_usize(config, "features", "macd_slow", d.macd_slow)?,
        macd_signal: get_usize(config, "features", "macd_signal", d.macd_signal)?,
    })
}

pub fn validate_feature_config(config: &FeatureConfig) -> Result<(), CotraderError> {
    if !config.label_threshold.is_finite() {
        return Err(invalid("features", "label_threshold", "label_threshold must be finite"));
    }
    let periods = [
        ("vol_window", config.vol_window),
        ("rsi_period", config.rsi_period),
        ("ema_period", config.ema_period),
        ("macd_fast", config.macd_fast),
        ("macd_slow", config.macd_slow),
        ("macd_signal", config.macd_signal),
    ];
    for (key, value) in periods {
        if value == 0 {
            return Err(invalid("features", key, format!("{} must be at least 1", key)));
        }
    }
    if config.macd_fast >= config.macd_slow {
        return Err(invalid(
            "features",
            "macd_fast",
            "macd_fast must be shorter than macd_slow",
        ));
    }
    Ok(())
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CotraderError> {
    let d = BacktestConfig::default();
    let overlay_policy = match config.get_string("backtest", "overlay_policy") {
        Some(s) => s
            .parse::<OverlayPolicy>()
            .map_err(|reason| invalid("backtest", "overlay_policy", reason))?,
        None => d.overlay_policy,
    };
    Ok(BacktestConfig {
        commission_per_trade: config.get_double("backtest", "commission", d.commission_per_trade),
        allow_shorts: config.get_bool("backtest", "allow_shorts", d.allow_shorts),
        charge_commission_on_flat: config.get_bool(
            "backtest",
            "charge_commission_on_flat",
            d.charge_commission_on_flat,
        ),
        overlay_policy,
        overlay_column: get_string_or(config, "backtest", "overlay_column", &d.overlay_column),
        price_column: get_string_or(config, "backtest", "price_column", &d.price_column),
        label_column: get_string_or(config, "backtest", "label_column", &d.label_column),
        purge_weeks: get_usize(config, "backtest", "purge_weeks", d.purge_weeks)?,
    })
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), CotraderError> {
    let c = config.commission_per_trade;
    if !c.is_finite() || c < 0.0 {
        return Err(invalid("backtest", "commission", "commission must be non-negative"));
    }
    if c >= 0.5 {
        return Err(invalid(
            "backtest",
            "commission",
            "commission must be a fraction of notional below 0.5",
        ));
    }
    if config.price_column == config.label_column {
        return Err(invalid(
            "backtest",
            "label_column",
            "label_column must differ from price_column",
        ));
    }
    Ok(())
}

pub fn load_rolling_config(config: &dyn ConfigPort) -> Result<RollingConfig, CotraderError> {
    let d = RollingConfig::default();
    Ok(RollingConfig {
        backtest: load_backtest_config(config)?,
        ratio_column: get_string_or(config, "rolling", "ratio_column", &d.ratio_column),
        bounded: config.get_bool("rolling", "bounded", d.bounded),
        parallel: config.get_bool("rolling", "parallel", d.parallel),
    })
}

pub fn validate_rolling_config(config: &RollingConfig) -> Result<(), CotraderError> {
    validate_backtest_config(&config.backtest)
}

/// Parse an ISO `YYYY-MM-DD` date from `[section] key`.
pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, CotraderError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(section, key, format!("invalid {} format, expected YYYY-MM-DD", key)))
}

/// Comma-separated quantiles, each strictly between 0 and 1.
pub fn parse_thresholds(value: &str) -> Result<Vec<f64>, CotraderError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let q: f64 = s
                .parse()
                .map_err(|_| invalid("rolling", "thresholds", format!("'{}' is not a number", s)))?;
            validate_threshold(q)?;
            Ok(q)
        })
        .collect()
}

/// An overlay quantile must lie strictly between 0 and 1.
pub fn validate_threshold(q: f64) -> Result<(), CotraderError> {
    if q > 0.0 && q < 1.0 {
        Ok(())
    } else {
        Err(invalid(
            "rolling",
            "thresholds",
            format!("threshold {} must be between 0 and 1", q),
        ))
    }
}

/// Checkpoint range, frequency and overlay thresholds for a rolling run.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSchedule {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub freq: Frequency,
    pub thresholds: Vec<f64>,
}

/// Build the schedule from `[rolling]`, letting each `Some` override win.
pub fn load_rolling_schedule(
    config: &dyn ConfigPort,
    start: Option<&str>,
    end: Option<&str>,
    freq: Option<&str>,
    thresholds: Option<&str>,
) -> Result<RollingSchedule, CotraderError> {
    let required = |key: &str, value: Option<&str>| -> Result<NaiveDate, CotraderError> {
        let raw = match value {
            Some(v) => v.to_string(),
            None => config
                .get_string("rolling", key)
                .ok_or_else(|| CotraderError::ConfigMissing {
                    section: "rolling".into(),
                    key: key.into(),
                })?,
        };
        parse_date(&raw, "rolling", key)
    };
    let start = required("start", start)?;
    let end = required("end", end)?;

    let freq = match freq.map(str::to_string).or_else(|| config.get_string("rolling", "freq")) {
        Some(f) => f
            .parse::<Frequency>()
            .map_err(|reason| invalid("rolling", "freq", reason))?,
        None => Frequency::default(),
    };

    let thresholds = match thresholds
        .map(str::to_string)
        .or_else(|| config.get_string("rolling", "thresholds"))
    {
        Some(t) => parse_thresholds(&t)?,
        None => DEFAULT_THRESHOLDS.to_vec(),
    };

    let schedule = RollingSchedule {
        start,
        end,
        freq,
        thresholds,
    };
    validate_rolling_schedule(&schedule)?;
    Ok(schedule)
}

pub fn validate_rolling_schedule(schedule: &RollingSchedule) -> Result<(), CotraderError> {
    if schedule.start >= schedule.end {
        return Err(invalid("rolling", "start", "start must be before end"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_gives_defaults() {
        let config = make_config("");
        assert_eq!(load_feature_config(&config).unwrap(), FeatureConfig::default());
        assert_eq!(load_backtest_config(&config).unwrap(), BacktestConfig::default());
        assert_eq!(load_rolling_config(&config).unwrap(), RollingConfig::default());
    }

    #[test]
    fn backtest_section_is_read() {
        let config = make_config(
            r#"
[backtest]
commission = 0.001
allow_shorts = true
charge_commission_on_flat = yes
overlay_policy = flatten
purge_weeks = 1
"#,
        );
        let bt = load_backtest_config(&config).unwrap();
        assert_eq!(bt.commission_per_trade, 0.001);
        assert!(bt.allow_shorts);
        assert!(bt.charge_commission_on_flat);
        assert_eq!(bt.overlay_policy, OverlayPolicy::Flatten);
        assert_eq!(bt.purge_weeks, 1);
        assert!(validate_backtest_config(&bt).is_ok());
    }

    #[test]
    fn unknown_overlay_policy_fails() {
        let config = make_config("[backtest]\noverlay_policy = invert\n");
        let err = load_backtest_config(&config).unwrap_err();
        assert!(matches!(err, CotraderError::ConfigInvalid { key, .. } if key == "overlay_policy"));
    }

    #[test]
    fn negative_commission_fails() {
        let bt = BacktestConfig {
            commission_per_trade: -0.001,
            ..BacktestConfig::default()
        };
        let err = validate_backtest_config(&bt).unwrap_err();
        assert!(matches!(err, CotraderError::ConfigInvalid { key, .. } if key == "commission"));
    }

    #[test]
    fn negative_purge_fails() {
        let config = make_config("[backtest]\npurge_weeks = -2\n");
        assert!(load_backtest_config(&config).is_err());
    }

    #[test]
    fn macd_fast_must_be_shorter() {
        let config = make_config("[features]\nmacd_fast = 26\nmacd_slow = 12\n");
        let fc = load_feature_config(&config).unwrap();
        let err = validate_feature_config(&fc).unwrap_err();
        assert!(matches!(err, CotraderError::ConfigInvalid { key, .. } if key == "macd_fast"));
    }

    #[test]
    fn zero_period_fails() {
        let fc = FeatureConfig {
            rsi_period: 0,
            ..FeatureConfig::default()
        };
        let err = validate_feature_config(&fc).unwrap_err();
        assert!(matches!(err, CotraderError::ConfigInvalid { key, .. } if key == "rsi_period"));
    }

    #[test]
    fn thresholds_parse_and_bound() {
        assert_eq!(parse_thresholds("0.9, 0.95").unwrap(), vec![0.9, 0.95]);
        assert!(parse_thresholds("").unwrap().is_empty());
        assert!(parse_thresholds("1.5").is_err());
        assert!(parse_thresholds("abc").is_err());
    }

    #[test]
    fn schedule_from_file_with_overrides() {
        let config = make_config("[rolling]\nstart = 2015-01-01\nend = 2020-01-01\nfreq = 3M\n");
        let s = load_rolling_schedule(&config, None, Some("2018-01-01"), None, None).unwrap();
        assert_eq!(s.start, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(s.end, NaiveDate::from_ymd_opt(2018, 1, 1).unwrap());
        assert_eq!(s.freq, Frequency::MonthEnds(3));
        assert_eq!(s.thresholds, vec![0.9]);
    }

    #[test]
    fn schedule_requires_start() {
        let err = load_rolling_schedule(&make_config(""), None, Some("2020-01-01"), None, None)
            .unwrap_err();
        assert!(matches!(err, CotraderError::ConfigMissing { key, .. } if key == "start"));
    }

    #[test]
    fn schedule_start_before_end() {
        let err = load_rolling_schedule(
            &make_config(""),
            Some("2020-01-01"),
            Some("2019-01-01"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CotraderError::ConfigInvalid { key, .. } if key == "start"));
    }

    #[test]
    fn bad_frequency_fails() {
        let err = load_rolling_schedule(
            &make_config("[rolling]\nfreq = 2Y\n"),
            Some("2019-01-01"),
            Some("2020-01-01"),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CotraderError::ConfigInvalid { key, .. } if key == "freq"));
    }

    #[test]
    fn bad_date_format_fails() {
        let err = parse_date("2020/01/01", "rolling", "start").unwrap_err();
        assert!(matches!(err, CotraderError::ConfigInvalid { key, .. } if key == "start"));
    }
}
