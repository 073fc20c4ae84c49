//! Core domain types and logic.

pub mod backtest;
pub mod checkpoint;
pub mod classification;
pub mod config_validation;
pub mod error;
pub mod feature_table;
pub mod features;
pub mod indicator;
pub mod metrics;
pub mod model;
pub mod overlay;
pub mod rolling;
pub mod split;
pub mod weekly;
