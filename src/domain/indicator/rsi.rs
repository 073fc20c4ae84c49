//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); if avg_loss == 0: RSI = 100.
//! Warmup: first n weeks are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_rsi(closes: &[f64], period: usize) -> IndicatorSeries {
    if period == 0 || closes.len() < 2 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: closes
                .iter()
                .map(|_| IndicatorPoint::warmup(IndicatorValue::Simple(0.0)))
                .collect(),
        };
    }

    let mut values = Vec::with_capacity(closes.len());
    values.push(IndicatorPoint::warmup(IndicatorValue::Simple(0.0)));

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for change_idx in 0..gains.len() {
        if change_idx < period - 1 {
            values.push(IndicatorPoint::warmup(IndicatorValue::Simple(0.0)));
            continue;
        }
        if change_idx == period - 1 {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        }
        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        values.push(IndicatorPoint::ready(IndicatorValue::Simple(rsi)));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
