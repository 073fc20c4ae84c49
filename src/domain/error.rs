//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for cotrader.
#[derive(Debug, thiserror::Error)]
pub enum CotraderError {
    #[error("missing required column `{column}`")]
    MissingColumn { column: String },

    #[error("invalid value in column `{column}` at row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    #[error("open interest is zero for week {week}; filter the row before building features")]
    ZeroOpenInterest { week: NaiveDate },

    #[error("series is not sorted ascending at row {index}: {current} follows {previous}")]
    UnsortedSeries {
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("duplicate week {week}")]
    DuplicateWeek { week: NaiveDate },

    #[error("empty training set for checkpoint {checkpoint}")]
    EmptyTrainSet { checkpoint: NaiveDate },

    #[error("model error: {reason}")]
    Model { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("csv error: {reason}")]
    Csv { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CotraderError {
    pub fn missing_column(column: &str) -> Self {
        CotraderError::MissingColumn {
            column: column.to_string(),
        }
    }

    pub fn model(reason: impl Into<String>) -> Self {
        CotraderError::Model {
            reason: reason.into(),
        }
    }
}

impl From<csv::Error> for CotraderError {
    fn from(err: csv::Error) -> Self {
        CotraderError::Csv {
            reason: err.to_string(),
        }
    }
}

impl From<&CotraderError> for std::process::ExitCode {
    fn from(err: &CotraderError) -> Self {
        let code: u8 = match err {
            CotraderError::Io(_) | CotraderError::Csv { .. } => 1,
            CotraderError::ConfigParse { .. }
            | CotraderError::ConfigMissing { .. }
            | CotraderError::ConfigInvalid { .. } => 2,
            CotraderError::MissingColumn { .. }
            | CotraderError::InvalidValue { .. }
            | CotraderError::ZeroOpenInterest { .. }
            | CotraderError::UnsortedSeries { .. }
            | CotraderError::DuplicateWeek { .. } => 3,
            CotraderError::EmptyTrainSet { .. } => 4,
            CotraderError::Model { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
