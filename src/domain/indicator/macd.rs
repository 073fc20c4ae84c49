//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Warmup: slow - 1 + signal - 1 weeks.

use crate::domain::indicator::ema::ema_raw_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if closes.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let ema_fast = ema_raw_values(closes, fast);
    let ema_slow = ema_raw_values(closes, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();

    let k = 2.0 / (signal_period as f64 + 1.0);
    let mut signal_line = vec![0.0; closes.len()];
    let macd_warmup = slow - 1;

    if macd_warmup + signal_period <= closes.len() {
        let seed: f64 = macd_line[macd_warmup..macd_warmup + signal_period]
            .iter()
            .sum::<f64>()
            / signal_period as f64;
        let mut signal_ema = seed;
        signal_line[macd_warmup + signal_period - 1] = signal_ema;

        for i in (macd_warmup + signal_period)..closes.len() {
            signal_ema = macd_line[i] * k + signal_ema * (1.0 - k);
            signal_line[i] = signal_ema;
        }
    }

    let signal_warmup = slow - 1 + signal_period - 1;

    let values = macd_line
        .iter()
        .zip(&signal_line)
        .enumerate()
        .map(|(i, (&line, &signal))| IndicatorPoint {
            valid: i >= signal_warmup,
            value: IndicatorValue::Macd {
                line,
                signal,
                histogram: line - signal,
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_macd_default(closes: &[f64]) -> IndicatorSeries {
    calculate_macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_warmup_default() {
        let series = calculate_macd_default(&rising(40));
        let warmup = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;
        for i in 0..warmup {
            assert!(!series.values[i].valid, "index {} should not be valid", i);
        }
        assert!(series.values[warmup].valid);
    }

    #[test]
    fn macd_histogram_equals_line_minus_signal() {
        let series = calculate_macd_default(&rising(40));
        for point in series.values.iter().filter(|p| p.valid) {
            if let IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } = point.value
            {
                assert!((histogram - (line - signal)).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn macd_line_is_ema_fast_minus_ema_slow() {
        let closes = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
        let series = calculate_macd(&closes, 3, 5, 2);
        let ema_fast = ema_raw_values(&closes, 3);
        let ema_slow = ema_raw_values(&closes, 5);

        for (i, point) in series.values.iter().enumerate() {
            if let IndicatorValue::Macd { line, .. } = point.value {
                assert!((line - (ema_fast[i] - ema_slow[i])).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn macd_zero_period() {
        let closes = [100.0, 101.0, 102.0];
        assert!(calculate_macd(&closes, 0, 26, 9).values.is_empty());
        assert!(calculate_macd(&closes, 12, 0, 9).values.is_empty());
        assert!(calculate_macd(&closes, 12, 26, 0).values.is_empty());
    }

    #[test]
    fn macd_short_series_never_valid() {
        let series = calculate_macd_default(&rising(20));
        assert_eq!(series.values.len(), 20);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
