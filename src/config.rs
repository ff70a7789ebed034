//! Bridge Configuration - passed from higher layers or read from the environment

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::paths::{env as keys, server, timing};
use crate::core::NetworkContext;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("cannot read {path}: {message}")]
    EnvFile { path: String, message: String },
}

/// Bridge configuration. Higher layers construct this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub network: NetworkContext,
    pub host: String,
    pub port: u16,
    pub poll_interval_ms: u64,
    pub max_attempts: u32,
    pub status_interval_secs: u64,
    /// Passed through to `signTx`; multi-party transactions set it.
    pub partial_sign: bool,
    /// Status-source base URL override.
    pub koios_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            network: NetworkContext::default(),
            host: server::HOST.into(),
            port: server::PORT,
            poll_interval_ms: timing::DISCOVERY_INTERVAL_MS,
            max_attempts: timing::DISCOVERY_MAX_ATTEMPTS,
            status_interval_secs: timing::STATUS_INTERVAL_SECS,
            partial_sign: false,
            koios_url: None,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_network(mut self, network: NetworkContext) -> Self { self.network = network; self }
    pub fn with_host(mut self, host: impl Into<String>) -> Self { self.host = host.into(); self }
    pub fn with_port(mut self, port: u16) -> Self { self.port = port; self }
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self { self.poll_interval_ms = ms; self }
    pub fn with_max_attempts(mut self, attempts: u32) -> Self { self.max_attempts = attempts; self }
    pub fn with_status_interval_secs(mut self, secs: u64) -> Self { self.status_interval_secs = secs; self }
    pub fn with_partial_sign(mut self, partial: bool) -> Self { self.partial_sign = partial; self }
    pub fn with_koios_url(mut self, url: impl Into<String>) -> Self { self.koios_url = Some(url.into()); self }

    /// Never zero; a zero setting reads as the minimum tick.
    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms.max(timing::MIN_TICK_MS)) }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs).max(Duration::from_millis(timing::MIN_TICK_MS))
    }

    pub fn koios_base(&self) -> &str {
        self.koios_url.as_deref().unwrap_or_else(|| self.network.koios_base())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid { key: keys::HOST, message: e.to_string() })
    }

    /// Defaults overlaid with `SIGNBRIDGE_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay_env()
    }

    pub fn overlay_env(mut self) -> Result<Self, ConfigError> {
        if let Some(raw) = read(keys::NETWORK) {
            self.network = raw.parse().map_err(|message| ConfigError::Invalid { key: keys::NETWORK, message })?;
        }
        if let Some(raw) = read(keys::HOST) {
            self.host = raw;
        }
        if let Some(raw) = read(keys::PORT) {
            self.port = parse(keys::PORT, &raw)?;
        }
        if let Some(raw) = read(keys::POLL_MS) {
            self.poll_interval_ms = positive(keys::POLL_MS, parse(keys::POLL_MS, &raw)?)?;
        }
        if let Some(raw) = read(keys::MAX_ATTEMPTS) {
            self.max_attempts = parse::<u32>(keys::MAX_ATTEMPTS, &raw)?;
            positive(keys::MAX_ATTEMPTS, self.max_attempts as u64)?;
        }
        if let Some(raw) = read(keys::STATUS_SECS) {
            self.status_interval_secs = positive(keys::STATUS_SECS, parse(keys::STATUS_SECS, &raw)?)?;
        }
        if let Some(raw) = read(keys::KOIOS_URL) {
            self.koios_url = Some(raw.trim_end_matches('/').to_string());
        }
        Ok(self)
    }
}

fn read(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid { key, message: format!("{raw:?}: {e}") })
}

fn positive(key: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid { key, message: "must be greater than zero".into() });
    }
    Ok(value)
}

/// Load `KEY=VALUE` lines into the process environment. Variables that are
/// already set win. Returns how many were applied.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<usize, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::EnvFile { path: path.display().to_string(), message: e.to_string() })?;

    let mut applied = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim().trim_start_matches("export ").trim();
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if key.is_empty() || value.is_empty() || std::env::var(key).is_ok() {
            continue;
        }
        std::env::set_var(key, value);
        applied += 1;
    }
    Ok(applied)
}
