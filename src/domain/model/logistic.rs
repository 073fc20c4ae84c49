//! Logistic regression fitted by batch gradient descent on standardised inputs.

use super::{Classifier, Scaler};
use crate::domain::error::CotraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub tolerance: f64,
    /// L2 penalty on the weights (not the intercept).
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        LogisticConfig {
            learning_rate: 0.1,
            max_iter: 1000,
            tolerance: 1e-7,
            l2: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    config: LogisticConfig,
    scaler: Scaler,
    weights: Vec<f64>,
    intercept: f64,
    fitted: bool,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        LogisticRegression {
            config,
            scaler: Scaler::default(),
            weights: Vec::new(),
            intercept: 0.0,
            fitted: false,
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let e = z.exp();
            e / (1.0 + e)
        }
    }

    fn log_loss(y: &[u8], p: &[f64]) -> f64 {
        let eps = 1e-15;
        -y.iter()
            .zip(p)
            .map(|(&y, &p)| {
                let p = p.clamp(eps, 1.0 - eps);
                let y = y as f64;
                y * p.ln() + (1.0 - y) * (1.0 - p).ln()
            })
            .sum::<f64>()
            / y.len() as f64
    }

    fn linear(&self, row: &[f64]) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.weights)
                .map(|(x, w)| x * w)
                .sum::<f64>()
    }

    /// Probability of class 1 for each row.
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, CotraderError> {
        if !self.fitted {
            return Err(CotraderError::model("logistic regression is not fitted"));
        }
        x.iter()
            .map(|row| {
                if row.len() != self.weights.len() {
                    return Err(CotraderError::model(format!(
                        "expected {} features, got {}",
                        self.weights.len(),
                        row.len()
                    )));
                }
                Ok(Self::sigmoid(self.linear(&self.scaler.transform(row))))
            })
            .collect()
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(LogisticConfig::default())
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "logistic"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), CotraderError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(CotraderError::model(format!(
                "cannot fit on {} rows with {} labels",
                x.len(),
                y.len()
            )));
        }

        self.scaler = Scaler::fit(x);
        let xs: Vec<Vec<f64>> = x.iter().map(|r| self.scaler.transform(r)).collect();
        let n = xs.len() as f64;
        let n_features = xs[0].len();

        self.weights = vec![0.0; n_features];
        self.intercept = 0.0;
        let mut previous_cost = f64::INFINITY;

        for _ in 0..self.config.max_iter {
            let probs: Vec<f64> = xs.iter().map(|r| Self::sigmoid(self.linear(r))).collect();

            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for ((row, &p), &label) in xs.iter().zip(&probs).zip(y) {
                let err = p - label as f64;
                grad_b += err;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
            }

            for (w, g) in self.weights.iter_mut().zip(&grad_w) {
                *w -= self.config.learning_rate * (g / n + self.config.l2 * *w);
            }
            self.intercept -= self.config.learning_rate * grad_b / n;

            let cost = Self::log_loss(y, &probs);
            if (previous_cost - cost).abs() < self.config.tolerance {
                break;
            }
            previous_cost = cost;
        }

        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, CotraderError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p >= 0.5))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, 1.0]).collect();
        let y = (0..40).map(|i| u8::from(i >= 20)).collect();
        (x, y)
    }

    #[test]
    fn learns_separable_threshold() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&[vec![2.0, 1.0], vec![37.0, 1.0]]).unwrap();
        assert_eq!(preds, vec![0, 1]);
        assert!(model.weights()[0] > 0.0);
    }

    #[test]
    fn probabilities_in_unit_interval() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        for p in model.predict_proba(&x).unwrap() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn single_class_predicts_that_class() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![1; 10];
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&[vec![3.0]]).unwrap(), vec![1]);
    }

    #[test]
    fn predict_before_fit_is_error() {
        let model = LogisticRegression::default();
        assert!(model.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn width_mismatch_is_error() {
        let (x, y) = separable();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert!(model.predict(&[vec![1.0]]).is_err());
    }

    #[test]
    fn empty_fit_is_error() {
        let mut model = LogisticRegression::default();
        assert!(model.fit(&[], &[]).is_err());
    }

    #[test]
    fn sigmoid_is_stable() {
        assert!((LogisticRegression::sigmoid(0.0) - 0.5).abs() < f64::EPSILON);
        assert!(LogisticRegression::sigmoid(-1000.0).is_finite());
        assert!(LogisticRegression::sigmoid(1000.0) <= 1.0);
    }
}
