//! Global settings of the backtest client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{LazyLock, RwLock};

use super::utility::get_file_path;

/// Setting filename
pub const SETTING_FILENAME: &str = "backtest_setting.json";

/// Default settings
fn default_settings() -> HashMap<String, SettingValue> {
    let mut settings = HashMap::new();

    // API settings
    settings.insert("api.base_url".to_string(), SettingValue::String("http://localhost:8000".to_string()));
    settings.insert("api.timeout".to_string(), SettingValue::Int(30));
    settings.insert("api.proxy_host".to_string(), SettingValue::String(String::new()));
    settings.insert("api.proxy_port".to_string(), SettingValue::Int(0));

    // Poll settings
    settings.insert("poll.interval".to_string(), SettingValue::Int(2000));
    settings.insert("poll.max_failures".to_string(), SettingValue::Int(0));
    settings.insert("poll.backoff_factor".to_string(), SettingValue::Float(1.0));
    settings.insert("poll.max_interval".to_string(), SettingValue::Int(30_000));

    // Log settings
    settings.insert("log.level".to_string(), SettingValue::Int(20)); // INFO level
    settings.insert("log.console".to_string(), SettingValue::Bool(true));
    settings.insert("log.file".to_string(), SettingValue::Bool(false));

    settings
}

/// Setting value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl SettingValue {
    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Global settings container
pub struct Settings {
    settings: RwLock<HashMap<String, SettingValue>>,
}

impl Settings {
    /// Create settings from defaults overridden by the setting file
    pub fn new() -> Self {
        Self::load_from(&get_file_path(SETTING_FILENAME))
    }

    /// Create settings from defaults overridden by the given file, if it exists
    pub fn load_from(path: &Path) -> Self {
        let mut settings = default_settings();

        if let Some(file_settings) = load_settings_from_file(path) {
            settings.extend(file_settings);
        }

        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Get a setting value
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.settings.read().ok()?.get(key).cloned()
    }

    /// Get a string setting
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Get an integer setting
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int())
    }

    /// Get a float setting
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_float())
    }

    /// Get a bool setting
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Set a setting value
    pub fn set(&self, key: impl Into<String>, value: SettingValue) {
        if let Ok(mut settings) = self.settings.write() {
            settings.insert(key.into(), value);
        }
    }

    /// Get all settings as HashMap
    pub fn get_all(&self) -> HashMap<String, SettingValue> {
        self.settings
            .read()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }

    /// Save settings to the setting file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&get_file_path(SETTING_FILENAME))
    }

    /// Save settings to the given path
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let settings = self.settings.read().map_err(|e| e.to_string())?;
        let json = serde_json::to_string_pretty(&*settings)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Load settings from JSON file
fn load_settings_from_file(path: &Path) -> Option<HashMap<String, SettingValue>> {
    if path.exists() {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!("Ignoring malformed setting file {:?}: {}", path, e);
                None
            }
        }
    } else {
        None
    }
}

/// Global settings instance
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_value_types() {
        let s = SettingValue::String("test".to_string());
        assert_eq!(s.as_str(), Some("test"));

        let i = SettingValue::Int(42);
        assert_eq!(i.as_int(), Some(42));
        assert_eq!(i.as_float(), Some(42.0));

        let f = SettingValue::Float(1.5);
        assert_eq!(f.as_float(), Some(1.5));
        assert_eq!(f.as_int(), None);

        let b = SettingValue::Bool(true);
        assert_eq!(b.as_bool(), Some(true));
    }

    #[test]
    fn test_default_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join(SETTING_FILENAME));
        assert_eq!(settings.get_int("poll.interval"), Some(2000));
        assert_eq!(settings.get_int("api.timeout"), Some(30));
        assert_eq!(
            settings.get_string("api.base_url").as_deref(),
            Some("http://localhost:8000")
        );
        assert_eq!(settings.get_float("poll.backoff_factor"), Some(1.0));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTING_FILENAME);
        fs::write(
            &path,
            r#"{"api.base_url": "http://backtest.internal:9000", "poll.max_failures": 5}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(
            settings.get_string("api.base_url").as_deref(),
            Some("http://backtest.internal:9000")
        );
        assert_eq!(settings.get_int("poll.max_failures"), Some(5));
        // Untouched keys keep their defaults
        assert_eq!(settings.get_int("poll.interval"), Some(2000));
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTING_FILENAME);
        fs::write(&path, "not json").unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.get_int("poll.interval"), Some(2000));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTING_FILENAME);

        let settings = Settings::load_from(&path);
        settings.set("poll.interval", SettingValue::Int(500));
        settings.save_to(&path).unwrap();

        let reloaded = Settings::load_from(&path);
        assert_eq!(reloaded.get_int("poll.interval"), Some(500));
        assert_eq!(reloaded.get_all().len(), settings.get_all().len());
    }
}
