//! Error types for chatstats-core

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::types::RawDataset;

/// Main error type for the chatstats-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Request body is missing or has the wrong shape.
    ///
    /// Carries the stable message that is returned to the caller.
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),

    /// No scope was toggled on
    #[error("no scopes specified")]
    NoScopes,

    /// No timeframe was toggled on
    #[error("no timeframes specified")]
    NoTimeframes,

    /// The event store failed to return a dataset
    #[error("failed to fetch {dataset}: {message}")]
    UpstreamFetch {
        dataset: RawDataset,
        message: String,
    },

    /// Bucket generation was asked for a range that ends before it starts
    #[error("invalid range: end {end} is before start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Two series combined into a ratio do not share the same dates
    #[error("misaligned series: numerator has {numerator:?}, denominator has {denominator:?}")]
    MisalignedSeries {
        numerator: Vec<NaiveDate>,
        denominator: Vec<NaiveDate>,
    },

    /// Event store backend error
    #[error("store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short, stable message for the `{"error": ...}` response body.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::MalformedRequest(message) => *message,
            Error::NoScopes => "No scopes specified",
            Error::NoTimeframes => "No timeframes specified",
            Error::UpstreamFetch { dataset, .. } => match dataset {
                RawDataset::InputEvents => "Error obtaining inputs",
                RawDataset::UserCreationEvents => "Error obtaining users",
            },
            Error::InvalidRange { .. } | Error::MisalignedSeries { .. } => {
                "Error computing statistics"
            }
            Error::Store(_) | Error::Io(_) | Error::Json(_) => "Error obtaining data",
            Error::Config(_) => "Invalid configuration",
        }
    }

    /// HTTP status the reporting endpoint answers with.
    ///
    /// There is no 5xx path; every failure surfaces as a 400.
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// Result type alias for chatstats-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_stable() {
        assert_eq!(Error::NoScopes.user_message(), "No scopes specified");
        assert_eq!(Error::NoTimeframes.user_message(), "No timeframes specified");
        assert_eq!(
            Error::MalformedRequest("Invalid type of scopes").user_message(),
            "Invalid type of scopes"
        );
        assert_eq!(
            Error::UpstreamFetch {
                dataset: RawDataset::InputEvents,
                message: "timeout".to_string(),
            }
            .user_message(),
            "Error obtaining inputs"
        );
        assert_eq!(
            Error::UpstreamFetch {
                dataset: RawDataset::UserCreationEvents,
                message: "timeout".to_string(),
            }
            .user_message(),
            "Error obtaining users"
        );
    }

    #[test]
    fn test_status_code_is_bad_request() {
        assert_eq!(Error::NoScopes.status_code(), 400);
        assert_eq!(Error::Store("down".to_string()).status_code(), 400);
    }
}
