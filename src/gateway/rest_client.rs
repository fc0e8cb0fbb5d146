//! REST client for the backtest service.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::ApiConfig;
use super::constants::{API_PREFIX, RUN_PATH, STATUS_PATH, STRATEGIES_PATH};
use super::BacktestApi;
use crate::backtest::{
    ApiError, BacktestRequest, DecodeError, StatusReply, SubmitResponse, TaskHandle, TaskStatus,
};

/// HTTP client for the backtest service
pub struct BacktestRestClient {
    /// HTTP client
    client: Client,
    /// Service root
    base_url: Url,
}

impl BacktestRestClient {
    /// Create a client from connection settings
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.base_url.clone()));
        }

        let client = build_client(config)?;

        Ok(Self { client, base_url })
    }

    /// Service root this client talks to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL of an endpoint below `/api/v1`
    fn endpoint(&self, path: &str, extra: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            segments.extend(
                API_PREFIX
                    .split('/')
                    .chain(path.split('/'))
                    .filter(|s| !s.is_empty()),
            );
            if let Some(extra) = extra {
                segments.push(extra);
            }
        }
        Ok(url)
    }

    /// Send a request and decode the JSON reply
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        debug!("Backtest API request: {} {}", method, url);

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Backtest API request {} {} failed: {}", method, url, e);
            ApiError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(ApiError::from)?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                warn!("Backtest API rate limit hit: {}", text);
            } else {
                error!("Backtest API error {}: {}", status, text);
            }
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            error!("Failed to parse backtest API reply: {} - {}", e, text);
            ApiError::Decode(DecodeError::new("response body", format!("{} - {}", e, text)))
        })
    }
}

/// Build the reqwest client, routing through the proxy when one is configured
fn build_client(config: &ApiConfig) -> Result<Client, ApiError> {
    // Proxying is driven by settings only, environment proxies are ignored
    let direct = || {
        Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))
    };

    let Some(proxy_url) = config.proxy_url() else {
        return direct();
    };

    match reqwest::Proxy::all(&proxy_url) {
        Ok(proxy) => match Client::builder().proxy(proxy).timeout(config.timeout).build() {
            Ok(client) => {
                info!("REST client proxy configured: {}", proxy_url);
                Ok(client)
            }
            Err(e) => {
                warn!("Failed to create proxied HTTP client: {}", e);
                direct()
            }
        },
        Err(e) => {
            warn!("Invalid proxy configuration {}: {}", proxy_url, e);
            direct()
        }
    }
}

#[async_trait]
impl BacktestApi for BacktestRestClient {
    async fn run_backtest(&self, req: &BacktestRequest) -> Result<SubmitResponse, ApiError> {
        let url = self.endpoint(RUN_PATH, None)?;
        let body = serde_json::to_value(req)
            .map_err(|e| DecodeError::new("backtest request", e.to_string()))?;
        self.request(Method::POST, url, Some(body)).await
    }

    async fn get_status(&self, handle: &TaskHandle) -> Result<TaskStatus, ApiError> {
        let url = self.endpoint(STATUS_PATH, Some(handle.as_str()))?;
        let reply: StatusReply = self.request(Method::GET, url, None).await?;
        Ok(TaskStatus::decode(reply)?)
    }

    async fn get_strategies(&self) -> Result<Vec<String>, ApiError> {
        let url = self.endpoint(STRATEGIES_PATH, None)?;
        self.request(Method::GET, url, None).await
    }
}
