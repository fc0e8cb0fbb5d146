//! Constants of the backtest service HTTP API.

use std::time::Duration;

/// Prefix every endpoint lives under
pub const API_PREFIX: &str = "/api/v1";

/// Submit a backtest
pub const RUN_PATH: &str = "/backtest/run";

/// Query a task, followed by `/{task_id}`
pub const STATUS_PATH: &str = "/backtest/status";

/// List available strategies
pub const STRATEGIES_PATH: &str = "/backtest/strategies";

/// Default service address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Request timeout for every call (submission included)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed cadence of status queries
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Upper bound for the poll interval when backoff is enabled
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);
