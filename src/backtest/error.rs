//! Error types for backtest submission and tracking.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A backtest request failed validation before being sent
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: String, end: String },
    #[error("initial cash must be positive, got {0}")]
    NonPositiveCash(f64),
}

/// A reply from the backtest service did not have the expected shape
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to decode {context}: {message}")]
pub struct DecodeError {
    pub context: &'static str,
    pub message: String,
}

impl DecodeError {
    pub fn new(context: &'static str, message: impl Into<String>) -> Self {
        Self {
            context,
            message: message.into(),
        }
    }
}

/// Failure talking to the backtest service
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ApiError {
    /// Whether a status query failing this way should simply be retried on
    /// the next poll tick.
    ///
    /// Server errors, request timeouts (408) and rate limiting (429) are
    /// retried; any other 4xx answer will not change on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout => true,
            ApiError::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            ApiError::InvalidUrl(_) | ApiError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(DecodeError::new("response body", e.to_string()))
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Submitting a backtest failed; the task never entered polling
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("backtest submission failed: {0}")]
    Api(#[from] ApiError),
    #[error("backtest submission timed out after {0:?}")]
    Timeout(Duration),
    #[error("backtest service answered with status {0:?} instead of \"submitted\"")]
    Rejected(String),
    #[error("submission was cancelled before the service replied")]
    Cancelled,
}

/// What kind of terminal failure ended a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The task queue reported `FAILURE`
    Task,
    /// The task completed but the backtest itself reported an error
    Business,
    /// The status reply could not be interpreted
    Decode,
    /// The service refused the status query itself
    Request,
    /// Too many consecutive status queries failed
    RetriesExhausted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Task => "task failure",
            FailureKind::Business => "backtest error",
            FailureKind::Decode => "malformed status",
            FailureKind::Request => "status query rejected",
            FailureKind::RetriesExhausted => "status unreachable",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a submitted task, carrying the message to show
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
