//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) weeks are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_ema(closes: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || closes.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let mut values = Vec::with_capacity(closes.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &close) in closes.iter().enumerate() {
        if i < period - 1 {
            sum += close;
            values.push(IndicatorPoint::warmup(IndicatorValue::Simple(0.0)));
        } else if i == period - 1 {
            sum += close;
            ema = sum / period as f64;
            values.push(IndicatorPoint::ready(IndicatorValue::Simple(ema)));
        } else {
            ema = close * k + ema * (1.0 - k);
            values.push(IndicatorPoint::ready(IndicatorValue::Simple(ema)));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// Raw EMA values with `0.0` during warmup.
pub(crate) fn ema_raw_values(closes: &[f64], period: usize) -> Vec<f64> {
    calculate_ema(closes, period)
        .values
        .iter()
        .map(|p| match p.value {
            IndicatorValue::Simple(v) => v,
            IndicatorValue::Macd { .. } => 0.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(series: &IndicatorSeries, i: usize) -> f64 {
        match series.values[i].value {
            IndicatorValue::Simple(v) => v,
            _ => panic!("Expected Simple value"),
        }
    }

    #[test]
    fn ema_warmup() {
        let series = calculate_ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn ema_seed_is_sma() {
        let series = calculate_ema(&[10.0, 20.0, 30.0], 3);
        assert!((simple(&series, 2) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_recursive_calculation() {
        let series = calculate_ema(&[10.0, 20.0, 30.0, 40.0, 50.0], 3);

        let k = 2.0 / 4.0;
        let sma = 20.0;
        let ema_3 = 40.0 * k + sma * (1.0 - k);
        let ema_4 = 50.0 * k + ema_3 * (1.0 - k);

        assert!((simple(&series, 3) - ema_3).abs() < f64::EPSILON);
        assert!((simple(&series, 4) - ema_4).abs() < f64::EPSILON);
    }

    #[test]
    fn ema_equal_prices() {
        let series = calculate_ema(&[100.0; 5], 3);
        for i in 2..5 {
            assert!((simple(&series, i) - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ema_empty_and_zero_period() {
        assert!(calculate_ema(&[], 3).values.is_empty());
        assert!(calculate_ema(&[10.0, 20.0], 0).values.is_empty());
    }
}
