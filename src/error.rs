use chrono::NaiveDate;
use thiserror::Error;

/// Failure reported by a market-data provider. Recoverable: the previous
/// snapshot stays on screen and the next explicit refresh retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("instrument {0} not found")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            let what = e
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "requested resource".to_string());
            FetchError::NotFound(what)
        } else if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Parse(e.to_string())
    }
}

/// Failure of the tick sampler. Terminates the sampling loop; the user has
/// to start it again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("sampler is already running")]
    AlreadyRunning,

    #[error("no baseline close loaded")]
    NoBaseline,

    #[error("tick computation failed: {0}")]
    Computation(String),

    #[error("tick queue consumer is gone")]
    QueueClosed,
}

/// Reason a bar was left out of a rendered frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("bar {date} has a non-finite price")]
    NonFinitePrice { date: NaiveDate },

    #[error("bar {date} has a non-positive price")]
    NonPositivePrice { date: NaiveDate },

    #[error("bar {date} violates low <= open/close <= high")]
    OhlcOrder { date: NaiveDate },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
