//! Technical indicators over a weekly close series.
//!
//! Every indicator returns one [`IndicatorPoint`] per input close. Points
//! inside the warmup window are marked invalid and carry `0.0`; the feature
//! builder drops any week where an indicator is still warming up.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod volatility;

pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use volatility::calculate_volatility;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub valid: bool,
    pub value: IndicatorValue,
}

impl IndicatorPoint {
    pub fn warmup(value: IndicatorValue) -> Self {
        IndicatorPoint {
            valid: false,
            value,
        }
    }

    pub fn ready(value: IndicatorValue) -> Self {
        IndicatorPoint { valid: true, value }
    }

    /// The scalar feature this point contributes, or `None` during warmup.
    pub fn feature(&self) -> Option<f64> {
        if !self.valid {
            return None;
        }
        Some(match self.value {
            IndicatorValue::Simple(v) => v,
            IndicatorValue::Macd { histogram, .. } => histogram,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Volatility(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "ema_{}", period),
            IndicatorType::Rsi(period) => write!(f, "rsi_{}", period),
            IndicatorType::Volatility(period) => write!(f, "vol_{}w", period),
            IndicatorType::Macd { .. } => write!(f, "macd_hist"),
        }
    }
}
