//! Process configuration from environment variables

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

use crate::dashboard::MIN_ACCESS_KEY_LEN;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Storage URI, e.g. `file://./data` or `s3://bucket/prefix`
    pub storage: String,
    pub base_url: String,
    /// Access key of the welcome demo dashboard; the demo is off without it
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub lock_eviction_interval: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let listen_addr: SocketAddr = var("LISTEN_ADDR", "0.0.0.0:3000")
            .parse()
            .context("Invalid LISTEN_ADDR")?;

        let request_timeout = var("REQUEST_TIMEOUT_SECS", "10")
            .parse()
            .map(Duration::from_secs)
            .context("Invalid REQUEST_TIMEOUT_SECS")?;

        let lock_eviction_interval = var("LOCK_EVICTION_INTERVAL_SECS", "300")
            .parse()
            .map(Duration::from_secs)
            .context("Invalid LOCK_EVICTION_INTERVAL_SECS")?;
        anyhow::ensure!(
            !lock_eviction_interval.is_zero(),
            "LOCK_EVICTION_INTERVAL_SECS must be greater than zero"
        );

        let log_format = match var("LOG_FORMAT", "text").as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => anyhow::bail!("Invalid LOG_FORMAT '{}', expected text or json", other),
        };

        let api_token = lookup("API_TOKEN").filter(|token| !token.is_empty());
        if let Some(token) = &api_token {
            anyhow::ensure!(
                token.len() >= MIN_ACCESS_KEY_LEN,
                "API_TOKEN must be at least {} characters",
                MIN_ACCESS_KEY_LEN
            );
        }

        Ok(Self {
            listen_addr,
            storage: var("STORAGE", "file://./data"),
            base_url: var("BASE_URL", ""),
            api_token,
            request_timeout,
            lock_eviction_interval,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.storage, "file://./data");
        assert_eq!(config.api_token, None);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("STORAGE", "s3://bucket/boards"),
            ("API_TOKEN", "welcome-token"),
            ("LOG_FORMAT", "json"),
            ("REQUEST_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.storage, "s3://bucket/boards");
        assert_eq!(config.api_token.as_deref(), Some("welcome-token"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(config(&[("LISTEN_ADDR", "nowhere")]).is_err());
        assert!(config(&[("API_TOKEN", "short")]).is_err());
        assert!(config(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(config(&[("LOCK_EVICTION_INTERVAL_SECS", "0")]).is_err());
    }
}
