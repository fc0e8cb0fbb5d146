//! Data structures exchanged with the backtest service.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{DecodeError, RequestError};

/// Status the service reports for an accepted submission
pub const SUBMITTED_STATUS: &str = "submitted";

/// Message used when a failed task carries no error text
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Parameters of one backtest run.
///
/// Built through [`BacktestRequest::new`], which enforces a non-empty
/// strategy and symbol, `start_date <= end_date` and a positive cash amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRequest {
    strategy: String,
    symbol: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    initial_cash: f64,
    params: BTreeMap<String, Value>,
}

impl BacktestRequest {
    pub fn new(
        strategy: impl Into<String>,
        symbol: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial_cash: f64,
    ) -> Result<Self, RequestError> {
        let strategy = strategy.into();
        let symbol = symbol.into();

        if strategy.trim().is_empty() {
            return Err(RequestError::EmptyField("strategy"));
        }
        if symbol.trim().is_empty() {
            return Err(RequestError::EmptyField("symbol"));
        }
        if start_date > end_date {
            return Err(RequestError::InvalidDateRange {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }
        // Also rejects NaN
        if !(initial_cash > 0.0) {
            return Err(RequestError::NonPositiveCash(initial_cash));
        }

        Ok(Self {
            strategy,
            symbol,
            start_date,
            end_date,
            initial_cash,
            params: BTreeMap::new(),
        })
    }

    /// Add a strategy parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

/// Opaque identifier of a task running on the service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self(task_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reply to `POST /backtest/run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: TaskHandle,
    pub status: String,
}

/// Side of a trade marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.pad("BUY"),
            TradeSide::Sell => f.pad("SELL"),
        }
    }
}

/// One OHLC bar of the result chart.
///
/// Travels as the array `[date, open, close, low, high]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, f64, f64, f64, f64)", into = "(String, f64, f64, f64, f64)")]
pub struct CandleBar {
    pub date: String,
    pub open: f64,
    pub close: f64,
    pub low: f64,
    pub high: f64,
}

impl From<(String, f64, f64, f64, f64)> for CandleBar {
    fn from((date, open, close, low, high): (String, f64, f64, f64, f64)) -> Self {
        Self {
            date,
            open,
            close,
            low,
            high,
        }
    }
}

impl From<CandleBar> for (String, f64, f64, f64, f64) {
    fn from(bar: CandleBar) -> Self {
        (bar.date, bar.open, bar.close, bar.low, bar.high)
    }
}

/// A trade executed during the backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMarker {
    pub date: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub price: f64,
    pub amount: f64,
}

/// Performance summary and chart data of a finished backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub final_value: f64,
    pub pnl: f64,
    /// `None` when the service could not compute a ratio (too few returns)
    #[serde(default)]
    pub sharpe_ratio: Option<f64>,
    #[serde(default)]
    pub max_drawdown: f64,
    #[serde(default)]
    pub total_trades: u64,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub chart_data: Vec<CandleBar>,
    #[serde(default)]
    pub trade_markers: Vec<TradeMarker>,
}

/// Business-level outcome nested inside a `SUCCESS` task state
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    Success(BacktestResult),
    Error(String),
}

impl ResultEnvelope {
    /// Decode `{status: "success", result}` or `{status: "error"|"failed", error}`
    pub fn decode(value: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut fields) = value else {
            return Err(DecodeError::new("result envelope", "expected an object"));
        };

        let status = match fields.remove("status") {
            Some(Value::String(status)) => status,
            Some(other) => {
                return Err(DecodeError::new(
                    "result envelope",
                    format!("status must be a string, got {}", other),
                ))
            }
            None => return Err(DecodeError::new("result envelope", "missing status")),
        };

        match status.as_str() {
            "success" => {
                let result = fields
                    .remove("result")
                    .ok_or_else(|| DecodeError::new("result envelope", "missing result"))?;
                serde_json::from_value(result)
                    .map(ResultEnvelope::Success)
                    .map_err(|e| DecodeError::new("backtest result", e.to_string()))
            }
            "error" | "failed" => {
                let message = match fields.remove("error") {
                    Some(Value::String(message)) => message,
                    Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
                    Some(other) => other.to_string(),
                };
                Ok(ResultEnvelope::Error(message))
            }
            other => Err(DecodeError::new(
                "result envelope",
                format!("unknown status {:?}", other),
            )),
        }
    }
}

/// Raw reply of `GET /backtest/status/{task_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReply {
    pub state: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Decoded state of a task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Started,
    Success(ResultEnvelope),
    Failure(String),
}

impl TaskStatus {
    /// Decode a raw status reply
    pub fn decode(reply: StatusReply) -> Result<Self, DecodeError> {
        match reply.state.as_str() {
            "PENDING" => Ok(TaskStatus::Pending),
            // Intermediate queue states carry no result yet
            "STARTED" | "RECEIVED" | "RETRY" => Ok(TaskStatus::Started),
            "SUCCESS" => {
                let result = reply
                    .result
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| DecodeError::new("task status", "SUCCESS without result"))?;
                ResultEnvelope::decode(result).map(TaskStatus::Success)
            }
            "FAILURE" => Ok(TaskStatus::Failure(error_message(reply.error))),
            "REVOKED" => Ok(TaskStatus::Failure("task revoked".to_string())),
            other => Err(DecodeError::new(
                "task status",
                format!("unknown state {:?}", other),
            )),
        }
    }

    /// Decode a status reply from JSON text
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        let reply: StatusReply = serde_json::from_str(text)
            .map_err(|e| DecodeError::new("task status", e.to_string()))?;
        Self::decode(reply)
    }
}

fn error_message(error: Option<Value>) -> String {
    match error {
        Some(Value::String(message)) if !message.is_empty() => message,
        Some(Value::Null) | None => UNKNOWN_ERROR.to_string(),
        Some(Value::String(_)) => UNKNOWN_ERROR.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_request_wire_shape() {
        let req = BacktestRequest::new("SmaCross", "EURUSD", date("2024-01-01"), date("2024-02-01"), 10000.0)
            .unwrap()
            .with_param("pfast", 10)
            .with_param("pslow", 30);

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "strategy": "SmaCross",
                "symbol": "EURUSD",
                "start_date": "2024-01-01",
                "end_date": "2024-02-01",
                "initial_cash": 10000.0,
                "params": {"pfast": 10, "pslow": 30}
            })
        );
    }

    #[test]
    fn test_request_validation() {
        let err = BacktestRequest::new("SmaCross", "EURUSD", date("2024-02-01"), date("2024-01-01"), 10000.0)
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidDateRange { .. }));

        let err = BacktestRequest::new("SmaCross", "EURUSD", date("2024-01-01"), date("2024-01-01"), 0.0)
            .unwrap_err();
        assert_eq!(err, RequestError::NonPositiveCash(0.0));

        let err = BacktestRequest::new("SmaCross", "EURUSD", date("2024-01-01"), date("2024-01-01"), f64::NAN)
            .unwrap_err();
        assert!(matches!(err, RequestError::NonPositiveCash(_)));

        let err = BacktestRequest::new("", "EURUSD", date("2024-01-01"), date("2024-01-02"), 1.0)
            .unwrap_err();
        assert_eq!(err, RequestError::EmptyField("strategy"));

        // Single-day range is allowed
        assert!(BacktestRequest::new("SmaCross", "XAUUSD", date("2024-01-01"), date("2024-01-01"), 1.0).is_ok());
    }

    #[test]
    fn test_result_decoding() {
        let result: BacktestResult = serde_json::from_value(json!({
            "final_value": 10500.0,
            "pnl": 500.0,
            "sharpe_ratio": 1.2,
            "max_drawdown": 3.5,
            "total_trades": 4,
            "win_rate": 0.75,
            "chart_data": [["2024-01-02", 1.10, 1.11, 1.09, 1.12]],
            "trade_markers": [{"date": "2024-01-02", "type": "buy", "price": 1.105, "amount": 1000}]
        }))
        .unwrap();

        assert_eq!(result.total_trades, 4);
        assert_eq!(result.chart_data[0].date, "2024-01-02");
        assert_eq!(result.chart_data[0].close, 1.11);
        assert_eq!(result.chart_data[0].high, 1.12);
        assert_eq!(result.trade_markers[0].side, TradeSide::Buy);
        assert_eq!(result.trade_markers[0].amount, 1000.0);

        let bar = serde_json::to_value(&result.chart_data[0]).unwrap();
        assert_eq!(bar, json!(["2024-01-02", 1.10, 1.11, 1.09, 1.12]));
    }

    #[test]
    fn test_result_without_chart_data() {
        let result: BacktestResult = serde_json::from_value(json!({
            "final_value": 9800.0,
            "pnl": -200.0,
            "sharpe_ratio": null,
            "max_drawdown": 4.0,
            "total_trades": 2,
            "win_rate": 0.0
        }))
        .unwrap();

        assert_eq!(result.sharpe_ratio, None);
        assert!(result.chart_data.is_empty());
        assert!(result.trade_markers.is_empty());
    }

    #[test]
    fn test_status_in_progress() {
        assert_eq!(TaskStatus::from_json(r#"{"state":"PENDING","status":"Pending..."}"#).unwrap(), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_json(r#"{"state":"STARTED","result":null}"#).unwrap(), TaskStatus::Started);
        assert_eq!(TaskStatus::from_json(r#"{"state":"RETRY"}"#).unwrap(), TaskStatus::Started);
    }

    #[test]
    fn test_status_success_envelope() {
        let status = TaskStatus::from_json(
            r#"{"state":"SUCCESS","result":{"status":"success","result":{"final_value":10500,"pnl":500}}}"#,
        )
        .unwrap();
        match status {
            TaskStatus::Success(ResultEnvelope::Success(result)) => {
                assert_eq!(result.final_value, 10500.0);
                assert_eq!(result.pnl, 500.0);
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn test_status_business_error_envelope() {
        let status = TaskStatus::from_json(
            r#"{"state":"SUCCESS","result":{"status":"error","error":"bad params"}}"#,
        )
        .unwrap();
        assert_eq!(status, TaskStatus::Success(ResultEnvelope::Error("bad params".to_string())));

        // The worker spells it "failed"
        let status = TaskStatus::from_json(
            r#"{"state":"SUCCESS","result":{"status":"failed","error":"Unknown strategy: Foo"}}"#,
        )
        .unwrap();
        assert_eq!(
            status,
            TaskStatus::Success(ResultEnvelope::Error("Unknown strategy: Foo".to_string()))
        );
    }

    #[test]
    fn test_status_failure() {
        assert_eq!(
            TaskStatus::from_json(r#"{"state":"FAILURE","error":"worker crashed"}"#).unwrap(),
            TaskStatus::Failure("worker crashed".to_string())
        );
        assert_eq!(
            TaskStatus::from_json(r#"{"state":"FAILURE","error":null}"#).unwrap(),
            TaskStatus::Failure(UNKNOWN_ERROR.to_string())
        );
        assert_eq!(
            TaskStatus::from_json(r#"{"state":"REVOKED"}"#).unwrap(),
            TaskStatus::Failure("task revoked".to_string())
        );
    }

    #[test]
    fn test_status_shape_mismatch() {
        assert!(TaskStatus::from_json(r#"{"state":"SUCCESS"}"#).is_err());
        assert!(TaskStatus::from_json(r#"{"state":"SUCCESS","result":{"final_value":1}}"#).is_err());
        assert!(TaskStatus::from_json(r#"{"state":"SUCCESS","result":{"status":"maybe"}}"#).is_err());
        assert!(TaskStatus::from_json(r#"{"state":"SUCCESS","result":{"status":"success","result":{"pnl":1}}}"#).is_err());
        assert!(TaskStatus::from_json(r#"{"state":"EXPLODED"}"#).is_err());
        assert!(TaskStatus::from_json(r#"{"status":"Pending..."}"#).is_err());
    }
}
