//! Backtest Client - submit trading-strategy backtests to a remote service
//! and follow them to completion.
//!
//! This crate provides:
//!
//! - A typed REST client for the backtest service (`/api/v1/backtest/*`)
//! - A task poller that submits one backtest at a time, polls its status on
//!   a fixed cadence and reports a single terminal outcome
//! - Settings and logging shared with the `backtest_client` binary
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use backtest_client::{ApiConfig, BacktestRequest, BacktestRestClient, PollerConfig, TaskPoller};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Arc::new(BacktestRestClient::new(&ApiConfig::new("http://localhost:8000"))?);
//!     let poller = TaskPoller::new(api, PollerConfig::default());
//!
//!     let request = BacktestRequest::new(
//!         "SmaCross",
//!         "EURUSD",
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
//!         10000.0,
//!     )?
//!     .with_param("pfast", 10)
//!     .with_param("pslow", 30);
//!
//!     let outcome = poller.submit_and_wait(request).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod backtest;
pub mod gateway;
pub mod platform;

// Re-export commonly used types
pub use backtest::{
    format_report, ApiError, BacktestRequest, BacktestResult, FailureKind, PollOutcome,
    PollerConfig, PollerPhase, SubmissionError, TaskFailure, TaskHandle, TaskPoller, TaskStatus,
};
pub use gateway::{ApiConfig, BacktestApi, BacktestRestClient};
pub use platform::{init_logger, Settings, SETTINGS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
