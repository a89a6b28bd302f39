//! Error taxonomy for one alerting cycle.
//!
//! Source and notification failures are fatal for the cycle and bubble up to
//! the process boundary. Store read failures never show up here: the store
//! recovers them locally (see `store`).

use thiserror::Error;

/// Top-level error returned by `Runner::run_once`.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("glucose source failed: {0}")]
    Source(#[from] SourceError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("decision failed: {0}")]
    Decision(#[from] DecisionError),

    #[error("last-seen store failed: {0}")]
    Store(#[from] StoreError),
}

/// Failures talking to the glucose monitor's cloud API.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {code} {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("login returned an invalid {0} id")]
    InvalidSession(&'static str),

    #[error("no glucose reading in the last {0} minutes")]
    NoRecentReading(u32),

    #[error("unparseable reading: {0}")]
    Parse(String),
}

impl SourceError {
    /// True when the API rejected our session id and a fresh login may help.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            SourceError::Api { code, .. } if code == "SessionIdNotFound" || code == "SessionNotValid"
        )
    }
}

/// Failures from the SMS / voice provider.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: [{code}] {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("malformed reading: {0}")]
    MalformedReading(String),

    #[error("invalid clock value: {0}")]
    Clock(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
