//! Gateway module - access to the remote backtest service.
//!
//! - **constants**: Endpoint paths and timing defaults
//! - **config**: Connection settings
//! - **rest_client**: `reqwest` implementation of [`BacktestApi`]

mod config;
pub mod constants;
mod rest_client;

use async_trait::async_trait;

use crate::backtest::{ApiError, BacktestRequest, SubmitResponse, TaskHandle, TaskStatus};

pub use config::ApiConfig;
pub use rest_client::BacktestRestClient;

/// Operations the backtest service offers
#[async_trait]
pub trait BacktestApi: Send + Sync {
    /// Submit a backtest, returning the task id the service assigned
    async fn run_backtest(&self, req: &BacktestRequest) -> Result<SubmitResponse, ApiError>;

    /// Query the state of a submitted task
    async fn get_status(&self, handle: &TaskHandle) -> Result<TaskStatus, ApiError>;

    /// List strategy names the service can run
    async fn get_strategies(&self) -> Result<Vec<String>, ApiError>;
}
