//! Bagged Gini decision trees with per-split feature sampling.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::Classifier;
use crate::domain::error::CotraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means sqrt of the feature count.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            n_trees: 100,
            max_depth: 8,
            min_samples_split: 4,
            min_samples_leaf: 2,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        /// Fraction of class-1 samples reaching this leaf.
        p_up: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn p_up(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf { p_up } => *p_up,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.p_up(row)
                } else {
                    right.p_up(row)
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    config: &'a ForestConfig,
    max_features: usize,
    rng: ChaCha8Rng,
}

fn gini(ones: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = ones as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl TreeBuilder<'_> {
    fn grow(&mut self, samples: &[usize], depth: usize) -> Node {
        let ones = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let p_up = ones as f64 / samples.len().max(1) as f64;

        if depth >= self.config.max_depth
            || samples.len() < self.config.min_samples_split
            || ones == 0
            || ones == samples.len()
        {
            return Node::Leaf { p_up };
        }

        let Some((feature, threshold)) = self.best_split(samples, ones) else {
            return Node::Leaf { p_up };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| self.x[i][feature] <= threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.grow(&left, depth + 1)),
            right: Box::new(self.grow(&right, depth + 1)),
        }
    }

    fn best_split(&mut self, samples: &[usize], ones: usize) -> Option<(usize, f64)> {
        let n_features = self.x[0].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);
        features.truncate(self.max_features);

        let total = samples.len();
        let parent = gini(ones, total);
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in features {
            let mut order: Vec<usize> = samples.to_vec();
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_ones = 0;
            for k in 1..total {
                left_ones += usize::from(self.y[order[k - 1]] == 1);
                let lo = self.x[order[k - 1]][feature];
                let hi = self.x[order[k]][feature];
                if lo == hi || k < min_leaf || total - k < min_leaf {
                    continue;
                }
                let right_ones = ones - left_ones;
                let impurity = (k as f64 * gini(left_ones, k)
                    + (total - k) as f64 * gini(right_ones, total - k))
                    / total as f64;
                let gain = parent - impurity;
                if gain > 0.0 && best.is_none_or(|(_, _, g)| gain > g) {
                    best = Some((feature, (lo + hi) / 2.0, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<Node>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        RandomForest {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean class-1 probability across trees.
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, CotraderError> {
        if self.trees.is_empty() {
            return Err(CotraderError::model("random forest is not fitted"));
        }
        x.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(CotraderError::model(format!(
                        "expected {} features, got {}",
                        self.n_features,
                        row.len()
                    )));
                }
                let sum: f64 = self.trees.iter().map(|t| t.p_up(row)).sum();
                Ok(sum / self.trees.len() as f64)
            })
            .collect()
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), CotraderError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(CotraderError::model(format!(
                "cannot fit on {} rows with {} labels",
                x.len(),
                y.len()
            )));
        }
        if self.config.n_trees == 0 {
            return Err(CotraderError::model("random forest needs at least one tree"));
        }

        self.n_features = x[0].len();
        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| (self.n_features as f64).sqrt().ceil() as usize)
            .clamp(1, self.n_features.max(1));

        let n = x.len();
        self.trees = (0..self.config.n_trees)
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(t as u64));
                let samples: Vec<usize> = if self.config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                if self.n_features == 0 {
                    let ones = samples.iter().filter(|&&i| y[i] == 1).count();
                    return Node::Leaf {
                        p_up: ones as f64 / n as f64,
                    };
                }
                let mut builder = TreeBuilder {
                    x,
                    y,
                    config: &self.config,
                    max_features,
                    rng,
                };
                builder.grow(&samples, 0)
            })
            .collect();
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, CotraderError> {
        // Ties go to the down class.
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }
}
