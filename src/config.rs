//! Configuration loading and persistence.
//!
//! Settings come from, in increasing priority: built-in defaults, the JSON
//! file `<config_dir>/gnc-link/config.json`, `GNC_*` environment variables,
//! and command-line flags (applied by the binary).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

use crate::constants::{DEFAULT_HOST, INFO_HISTORY_LEN, RECONNECT_DELAY};
use crate::ws::{endpoint_for_host, http_to_ws_scheme};

const CONFIG_FILE: &str = "config.json";

/// Configuration for the gnc-link client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Full endpoint URL. Takes precedence over `host` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Controller host; the endpoint is `ws://<host>:1506/ws`.
    pub host: String,
    /// Fixed delay between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Number of info messages replayed to late subscribers.
    pub info_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            host: DEFAULT_HOST.to_string(),
            reconnect_delay_ms: RECONNECT_DELAY.as_millis() as u64,
            info_history: INFO_HISTORY_LEN,
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `GNC_CONFIG_DIR` overrides the platform config directory.
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("GNC_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("gnc-link"))
    }

    /// Loads configuration from the config directory, with environment
    /// variable overrides. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_dir()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads `config.json` from `dir`, or the defaults if it does not exist.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply `GNC_URL`, `GNC_HOST`, `GNC_RECONNECT_DELAY_MS` and
    /// `GNC_INFO_HISTORY` as returned by `var`. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("GNC_URL") {
            self.url = Some(url);
        }

        if let Some(host) = var("GNC_HOST") {
            self.host = host;
        }

        if let Some(delay) = var("GNC_RECONNECT_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(ms) => self.reconnect_delay_ms = ms,
                Err(e) => log::warn!("Ignoring GNC_RECONNECT_DELAY_MS={delay}: {e}"),
            }
        }

        if let Some(history) = var("GNC_INFO_HISTORY") {
            match history.parse::<usize>() {
                Ok(n) => self.info_history = n,
                Err(e) => log::warn!("Ignoring GNC_INFO_HISTORY={history}: {e}"),
            }
        }
    }

    /// Persists the configuration to `config.json` in `dir`, creating the
    /// directory if needed.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// WebSocket endpoint the connection dials.
    pub fn endpoint(&self) -> String {
        match &self.url {
            Some(url) => http_to_ws_scheme(url),
            None => endpoint_for_host(&self.host),
        }
    }

    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint(), "ws://localhost:1506/ws");
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.info_history, 25);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_from(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"host":"cnc.local"}"#).unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.host, "cnc.local");
        assert_eq!(config.reconnect_delay_ms, 1000);
        assert_eq!(config.endpoint(), "ws://cnc.local:1506/ws");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        assert!(Config::load_from(dir.path()).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("gnc-link");
        let config = Config {
            url: Some("ws://10.0.0.5:1506/ws".to_string()),
            reconnect_delay_ms: 250,
            ..Config::default()
        };
        config.save_to(&nested).unwrap();
        assert_eq!(Config::load_from(&nested).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("GNC_HOST", "raspberrypi"),
            ("GNC_RECONNECT_DELAY_MS", "500"),
            ("GNC_INFO_HISTORY", "many"),
        ]));
        assert_eq!(config.host, "raspberrypi");
        assert_eq!(config.reconnect_delay_ms, 500);
        assert_eq!(config.info_history, 25);
    }

    #[test]
    fn test_url_wins_over_host() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("GNC_URL", "http://cnc.local:8080/ws"),
            ("GNC_HOST", "ignored"),
        ]));
        assert_eq!(config.endpoint(), "ws://cnc.local:8080/ws");
    }
}
