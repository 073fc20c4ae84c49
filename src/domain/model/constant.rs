//! Always predicts the same class. Baseline and test double.

use super::Classifier;
use crate::domain::error::CotraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantClassifier {
    class: u8,
}

impl ConstantClassifier {
    pub fn new(class: u8) -> Self {
        ConstantClassifier {
            class: class.min(1),
        }
    }

    pub fn class(&self) -> u8 {
        self.class
    }
}

impl Classifier for ConstantClassifier {
    fn name(&self) -> &str {
        "constant"
    }

    fn fit(&mut self, _x: &[Vec<f64>], _y: &[u8]) -> Result<(), CotraderError> {
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, CotraderError> {
        Ok(vec![self.class; x.len()])
    }
}
