//! Rolling volatility of weekly percentage returns.
//!
//! VOL(n)[i] = population stddev of the n returns ending at week i, where
//! return[j] = C[j] / C[j-1] - 1. Warmup: first n weeks are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_volatility(closes: &[f64], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        if period == 0 || i < period {
            values.push(IndicatorPoint::warmup(IndicatorValue::Simple(0.0)));
            continue;
        }

        let window = &closes[i - period..=i];
        let returns: Vec<f64> = window.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        let mean = returns.iter().sum::<f64>() / period as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / period as f64;

        values.push(IndicatorPoint::ready(IndicatorValue::Simple(
            variance.sqrt(),
        )));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Volatility(period),
        values,
    }
}
