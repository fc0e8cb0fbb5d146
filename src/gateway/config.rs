//! Connection settings for the backtest service.

use std::time::Duration;

use super::constants::{DEFAULT_BASE_URL, REQUEST_TIMEOUT};
use crate::platform::Settings;

/// Where and how to reach the backtest service
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Service root, without the `/api/v1` prefix
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Proxy host (can be empty)
    pub proxy_host: String,
    /// Proxy port (0 means no proxy)
    pub proxy_port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            proxy_host: String::new(),
            proxy_port: 0,
        }
    }
}

impl ApiConfig {
    /// Create a config pointing at `base_url` with default timeout and no proxy
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read `api.*` keys from settings
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();

        let base_url = settings
            .get_string("api.base_url")
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.base_url);
        let timeout = settings
            .get_int("api.timeout")
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(defaults.timeout);
        let proxy_host = settings.get_string("api.proxy_host").unwrap_or_default();
        let proxy_port = settings
            .get_int("api.proxy_port")
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(0);

        Self {
            base_url,
            timeout,
            proxy_host,
            proxy_port,
        }
    }

    /// Proxy URL, if one is configured
    pub fn proxy_url(&self) -> Option<String> {
        if !self.proxy_host.is_empty() && self.proxy_port > 0 {
            Some(format!("http://{}:{}", self.proxy_host, self.proxy_port))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{SettingValue, SETTING_FILENAME};

    fn empty_settings() -> (tempfile::TempDir, Settings) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join(SETTING_FILENAME));
        (dir, settings)
    }

    #[test]
    fn test_from_default_settings() {
        let (_dir, settings) = empty_settings();
        let config = ApiConfig::from_settings(&settings);
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.proxy_url(), None);
    }

    #[test]
    fn test_from_custom_settings() {
        let (_dir, settings) = empty_settings();
        settings.set("api.base_url", SettingValue::String("http://10.0.0.5:8000".into()));
        settings.set("api.timeout", SettingValue::Int(5));
        settings.set("api.proxy_host", SettingValue::String("127.0.0.1".into()));
        settings.set("api.proxy_port", SettingValue::Int(1080));

        let config = ApiConfig::from_settings(&settings);
        assert_eq!(config.base_url, "http://10.0.0.5:8000");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.proxy_url().as_deref(), Some("http://127.0.0.1:1080"));
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let (_dir, settings) = empty_settings();
        settings.set("api.timeout", SettingValue::Int(0));
        settings.set("api.proxy_host", SettingValue::String("127.0.0.1".into()));
        settings.set("api.proxy_port", SettingValue::Int(70_000));

        let config = ApiConfig::from_settings(&settings);
        assert_eq!(config.timeout, REQUEST_TIMEOUT);
        assert_eq!(config.proxy_port, 0);
        assert_eq!(config.proxy_url(), None);
    }
}
