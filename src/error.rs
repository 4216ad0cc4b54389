use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("No worklog data available for the requested period")]
    NoWorklogData,

    #[error("Invalid month key '{0}': expected YYYY-MM")]
    InvalidMonth(String),

    #[error("Invalid date bound '{0}': expected YYYY-MM-DD or '*'")]
    InvalidDateBound(String),

    #[error("Invalid date range for {context}: stop {stop} precedes start {start}")]
    InvalidDateRange {
        context: String,
        start: chrono::NaiveDate,
        stop: chrono::NaiveDate,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
