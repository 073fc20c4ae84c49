//! Data access port trait.

use crate::domain::error::CotraderError;
use crate::domain::feature_table::FeatureTable;
use crate::domain::weekly::WeeklyRecord;

pub trait DataPort {
    /// Merged COT + price rows, sorted ascending by week.
    fn load_weekly(&self) -> Result<Vec<WeeklyRecord>, CotraderError>;

    /// A previously built feature table, sorted ascending by week.
    fn load_features(&self) -> Result<FeatureTable, CotraderError>;
}
