//! Backtest module - submitting backtests and tracking them to completion.
//!
//! - **object**: Requests, task handles, task states and results
//! - **error**: Submission, decoding and task failure types
//! - **poller**: The task poller driving one submission at a time
//! - **report**: Text rendering of results

pub mod error;
pub mod object;
pub mod poller;
pub mod report;

pub use error::{ApiError, DecodeError, FailureKind, RequestError, SubmissionError, TaskFailure};
pub use object::{
    BacktestRequest, BacktestResult, CandleBar, ResultEnvelope, StatusReply, SubmitResponse,
    TaskHandle, TaskStatus, TradeMarker, TradeSide,
};
pub use poller::{OutcomeCallback, PollOutcome, PollerConfig, PollerPhase, TaskPoller};
pub use report::{format_report, Report};
