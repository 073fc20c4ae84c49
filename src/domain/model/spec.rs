//! Model artifact: the `[model]` INI section naming a classifier and its
//! hyper-parameters. Loading it yields a factory of unfitted classifiers.

use std::fmt;

use super::{
    Classifier, ConstantClassifier, ForestConfig, LogisticConfig, LogisticRegression,
    ModelFactory, RandomForest,
};
use crate::domain::error::CotraderError;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "model";

#[derive(Debug, Clone, PartialEq)]
pub enum ModelSpec {
    Logistic(LogisticConfig),
    RandomForest(ForestConfig),
    Constant { class: u8 },
}

impl ModelSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelSpec::Logistic(_) => "logistic",
            ModelSpec::RandomForest(_) => "random_forest",
            ModelSpec::Constant { .. } => "constant",
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CotraderError> {
        let kind = config
            .get_string(SECTION, "kind")
            .ok_or_else(|| CotraderError::ConfigMissing {
                section: SECTION.into(),
                key: "kind".into(),
            })?;

        match kind.trim().to_lowercase().as_str() {
            "logistic" => {
                let d = LogisticConfig::default();
                Ok(ModelSpec::Logistic(LogisticConfig {
                    learning_rate: config.get_double(SECTION, "learning_rate", d.learning_rate),
                    max_iter: non_negative(config, "max_iter", d.max_iter)?,
                    tolerance: config.get_double(SECTION, "tolerance", d.tolerance),
                    l2: config.get_double(SECTION, "l2", d.l2),
                }))
            }
            "random_forest" => {
                let d = ForestConfig::default();
                let max_features = non_negative(config, "max_features", 0)?;
                Ok(ModelSpec::RandomForest(ForestConfig {
                    n_trees: non_negative(config, "n_trees", d.n_trees)?,
                    max_depth: non_negative(config, "max_depth", d.max_depth)?,
                    min_samples_split: non_negative(
                        config,
                        "min_samples_split",
                        d.min_samples_split,
                    )?,
                    min_samples_leaf: non_negative(config, "min_samples_leaf", d.min_samples_leaf)?,
                    max_features: (max_features > 0).then_some(max_features),
                    bootstrap: config.get_bool(SECTION, "bootstrap", d.bootstrap),
                    seed: non_negative(config, "seed", d.seed as usize)? as u64,
                }))
            }
            "constant" => {
                let class = config.get_int(SECTION, "class", 1);
                if !(0..=1).contains(&class) {
                    return Err(CotraderError::ConfigInvalid {
                        section: SECTION.into(),
                        key: "class".into(),
                        reason: "class must be 0 or 1".into(),
                    });
                }
                Ok(ModelSpec::Constant { class: class as u8 })
            }
            other => Err(CotraderError::ConfigInvalid {
                section: SECTION.into(),
                key: "kind".into(),
                reason: format!(
                    "unknown model kind '{}' (expected logistic, random_forest or constant)",
                    other
                ),
            }),
        }
    }

    /// Serialise back to the INI form `from_config` reads.
    pub fn to_ini(&self) -> String {
        let mut out = format!("[{}]\nkind = {}\n", SECTION, self.kind());
        match self {
            ModelSpec::Logistic(c) => {
                out.push_str(&format!(
                    "learning_rate = {}\nmax_iter = {}\ntolerance = {}\nl2 = {}\n",
                    c.learning_rate, c.max_iter, c.tolerance, c.l2
                ));
            }
            ModelSpec::RandomForest(c) => {
                out.push_str(&format!(
                    "n_trees = {}\nmax_depth = {}\nmin_samples_split = {}\nmin_samples_leaf = {}\nmax_features = {}\nbootstrap = {}\nseed = {}\n",
                    c.n_trees,
                    c.max_depth,
                    c.min_samples_split,
                    c.min_samples_leaf,
                    c.max_features.unwrap_or(0),
                    c.bootstrap,
                    c.seed
                ));
            }
            ModelSpec::Constant { class } => {
                out.push_str(&format!("class = {}\n", class));
            }
        }
        out
    }
}

impl ModelFactory for ModelSpec {
    fn build(&self) -> Box<dyn Classifier> {
        match self {
            ModelSpec::Logistic(c) => Box::new(LogisticRegression::new(c.clone())),
            ModelSpec::RandomForest(c) => Box::new(RandomForest::new(c.clone())),
            ModelSpec::Constant { class } => Box::new(ConstantClassifier::new(*class)),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSpec::Logistic(c) => write!(f, "logistic(l2={})", c.l2),
            ModelSpec::RandomForest(c) => {
                write!(f, "random_forest(n_trees={}, max_depth={})", c.n_trees, c.max_depth)
            }
            ModelSpec::Constant { class } => write!(f, "constant({})", class),
        }
    }
}

fn non_negative(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, CotraderError> {
    let value = config.get_int(SECTION, key, default as i64);
    usize::try_from(value).map_err(|_| CotraderError::ConfigInvalid {
        section: SECTION.into(),
        key: key.into(),
        reason: format!("{} must be non-negative", key),
    })
}
