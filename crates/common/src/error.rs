use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Timeframe;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Insufficient data for {timeframe}: need {required} candles, got {actual}")]
    InsufficientData {
        timeframe: Timeframe,
        required: usize,
        actual: usize,
    },

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Oracle timed out: {0}")]
    OracleTimeout(String),

    #[error("Response parse error: {0}")]
    ResponseParse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DataFormat(_) => ErrorKind::DataFormat,
            Error::InsufficientData { .. } => ErrorKind::InsufficientData,
            Error::OracleUnavailable(_) => ErrorKind::OracleUnavailable,
            Error::OracleTimeout(_) => ErrorKind::OracleTimeout,
            Error::ResponseParse(_) => ErrorKind::ResponseParse,
            _ => ErrorKind::Internal,
        }
    }
}

/// Serializable failure class attached to degraded outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    DataFormat,
    InsufficientData,
    OracleUnavailable,
    OracleTimeout,
    ResponseParse,
    Internal,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
