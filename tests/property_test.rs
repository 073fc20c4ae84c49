//! Property tests for splitting, return accumulation and risk metrics.

mod common;

use common::*;
use cotrader::domain::metrics::{Metrics, cumulative, max_drawdown, sharpe, sortino};
use cotrader::domain::split::{split, time_series_folds};
use proptest::prelude::*;

proptest! {
    #[test]
    fn split_partitions_rows(n in 1usize..60, cut in 1usize..80) {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        let table = price_table(&closes, &vec![0.0; n]);
        let s = split(&table, week(cut)).unwrap();

        prop_assert_eq!(s.train.len() + s.test.len(), n);
        prop_assert!(s.train.iter().all(|r| r.week < week(cut)));
        prop_assert!(s.test.iter().all(|r| r.week >= week(cut)));
    }

    #[test]
    fn folds_train_strictly_before_test(n in 0usize..200, k in 1usize..8) {
        for (train_end, test) in time_series_folds(n, k) {
            prop_assert!(train_end > 0);
            prop_assert_eq!(train_end, test.start);
            prop_assert!(test.end <= n);
            prop_assert!(!test.is_empty());
        }
    }

    #[test]
    fn cumulative_follows_recurrence(returns in prop::collection::vec(-1.0f64..1.0, 0..80)) {
        let curve = cumulative(&returns);
        prop_assert_eq!(curve.len(), returns.len());
        let mut expected = 1.0;
        for (r, c) in returns.iter().zip(&curve) {
            expected *= 1.0 + r;
            prop_assert!((c - expected).abs() <= 1e-9 * expected.abs().max(1.0));
            prop_assert!(*c >= 0.0);
        }
    }

    #[test]
    fn drawdown_is_a_fraction(returns in prop::collection::vec(-1.0f64..1.0, 0..80)) {
        let dd = max_drawdown(&cumulative(&returns));
        prop_assert!((0.0..=1.0).contains(&dd));
    }

    #[test]
    fn constant_returns_have_zero_ratios(r in -0.5f64..0.5, n in 2usize..60) {
        let returns = vec![r; n];
        prop_assert_eq!(sharpe(&returns), 0.0);
        prop_assert_eq!(sortino(&returns), 0.0);
    }

    #[test]
    fn ratios_are_finite(returns in prop::collection::vec(-0.5f64..0.5, 0..80)) {
        prop_assert!(sharpe(&returns).is_finite());
        prop_assert!(sortino(&returns).is_finite());

        let m = Metrics::compute(&returns);
        prop_assert_eq!(m.weeks, returns.len());
        prop_assert!(m.cum_return >= 0.0);
    }
}
