//! Weekly performance statistics for one backtest cycle.

const WEEKS_PER_YEAR: f64 = 52.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Final value of the compounded curve; 1.0 means flat.
    pub cum_return: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub weeks: usize,
}

impl Metrics {
    /// Metrics for a cycle with no realized weeks.
    pub fn empty() -> Self {
        Metrics {
            cum_return: 1.0,
            sharpe: 0.0,
            sortino: 0.0,
            max_drawdown: 0.0,
            weeks: 0,
        }
    }

    pub fn compute(returns: &[f64]) -> Self {
        if returns.is_empty() {
            return Self::empty();
        }
        let curve = cumulative(returns);
        Metrics {
            cum_return: curve.last().copied().unwrap_or(1.0),
            sharpe: sharpe(returns),
            sortino: sortino(returns),
            max_drawdown: max_drawdown(&curve),
            weeks: returns.len(),
        }
    }
}

/// Running product of `1 + r`.
pub fn cumulative(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0_f64, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). `None` below two observations.
///
/// A constant series is exactly 0; the rounded mean would otherwise leave a
/// residual spread of order 1e-18.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    if values.iter().all(|v| *v == values[0]) {
        return Some(0.0);
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Annualised Sharpe ratio of weekly returns with a zero risk-free rate.
pub fn sharpe(returns: &[f64]) -> f64 {
    match sample_std(returns) {
        Some(sd) if sd > 0.0 => mean(returns) / sd * WEEKS_PER_YEAR.sqrt(),
        _ => 0.0,
    }
}

/// Annualised Sortino ratio: mean of all returns over the deviation of the
/// negative ones.
pub fn sortino(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    match sample_std(&downside) {
        Some(sd) if sd > 0.0 => mean(returns) / sd * WEEKS_PER_YEAR.sqrt(),
        _ => 0.0,
    }
}

/// Largest fractional fall from a running peak of the compounded curve.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let Some(&first) = curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in curve {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cumulative_compounds() {
        let curve = cumulative(&[0.1, -0.5, 0.2]);
        assert_relative_eq!(curve[0], 1.1);
        assert_relative_eq!(curve[1], 0.55);
        assert_relative_eq!(curve[2], 0.66);
    }

    #[test]
    fn empty_metrics_are_pinned() {
        let m = Metrics::compute(&[]);
        assert_eq!(m, Metrics::empty());
        assert_eq!(m.cum_return, 1.0);
    }

    #[test]
    fn sharpe_zero_when_flat_or_single() {
        assert_eq!(sharpe(&[0.01]), 0.0);
        assert_eq!(sharpe(&[0.01, 0.01, 0.01]), 0.0);
        assert_eq!(sharpe(&[]), 0.0);
    }

    #[test]
    fn constant_series_have_zero_ratios() {
        for r in [vec![0.1; 3], vec![-0.002; 26], vec![-0.0015; 7], vec![0.0123; 26]] {
            assert_eq!(sharpe(&r), 0.0, "sharpe of {:?}", r);
            assert_eq!(sortino(&r), 0.0, "sortino of {:?}", r);
        }
    }

    #[test]
    fn constant_losses_leave_sortino_zero_with_positive_weeks() {
        let r = [0.02, -0.001, -0.001, -0.001, 0.03];
        assert_eq!(sortino(&r), 0.0);
        assert!(sharpe(&r) > 0.0);
    }

    #[test]
    fn sharpe_uses_sample_std() {
        // mean 0.02, sample sd 0.01*sqrt(2)
        let r = [0.01, 0.03];
        let expected = 0.02 / (0.02_f64 / 2.0_f64.sqrt()) * 52.0_f64.sqrt();
        assert_relative_eq!(sharpe(&r), expected, epsilon = 1e-12);
    }

    #[test]
    fn sortino_needs_two_losses() {
        assert_eq!(sortino(&[0.05, -0.01, 0.02]), 0.0);
        let r = [0.05, -0.01, -0.03];
        let expected = mean(&r) / (0.02_f64 / 2.0_f64.sqrt()) * 52.0_f64.sqrt();
        assert_relative_eq!(sortino(&r), expected, epsilon = 1e-12);
    }

    #[test]
    fn drawdown_from_peak() {
        let curve = [1.0, 1.1, 0.9, 0.95, 0.8, 1.0];
        assert_relative_eq!(max_drawdown(&curve), (1.1 - 0.8) / 1.1);
        assert_eq!(max_drawdown(&[1.2]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn total_loss_is_full_drawdown() {
        let m = Metrics::compute(&[0.1, -1.0]);
        assert_eq!(m.cum_return, 0.0);
        assert_relative_eq!(m.max_drawdown, 1.0);
    }

    #[test]
    fn compute_counts_weeks() {
        let m = Metrics::compute(&[0.01, 0.02, -0.01]);
        assert_eq!(m.weeks, 3);
        assert!(m.sharpe > 0.0);
    }
}
