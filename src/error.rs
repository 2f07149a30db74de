use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to fetch readings for {day}: {message}")]
    Fetch { day: NaiveDate, message: String },

    #[error("Fetching readings for {day} timed out after {seconds}s")]
    FetchTimeout { day: NaiveDate, seconds: u64 },

    #[error("Out-of-order day for {key}: {day} is not after last day {last_day}")]
    OutOfOrderDay {
        key: String,
        day: NaiveDate,
        last_day: NaiveDate,
    },

    #[error("Series {key} is halted after an ordering violation")]
    HaltedSeries { key: String },

    #[error("Window of {n_days} days is outside the valid range [1, {capacity}]")]
    InvalidWindow { n_days: u32, capacity: u32 },

    #[error("Station {station_id} not found")]
    UnknownStation { station_id: String },

    #[error("Pollutant '{code}' is not recognized or not monitored at station {station_id}")]
    UnknownPollutant { station_id: String, code: String },

    #[error("History store has not been initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    /// Upstream failures that leave the checkpoint untouched and succeed on a later tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessingError::Fetch { .. }
                | ProcessingError::FetchTimeout { .. }
                | ProcessingError::Http(_)
                | ProcessingError::Io(_)
                | ProcessingError::Csv(_)
        )
    }

    /// Status code for errors surfaced to query callers, `None` for internal failures.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProcessingError::UnknownStation { .. } => Some(404),
            ProcessingError::UnknownPollutant { .. } | ProcessingError::InvalidWindow { .. } => {
                Some(400)
            }
            _ => None,
        }
    }
}
