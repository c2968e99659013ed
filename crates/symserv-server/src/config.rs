//! Environment-driven configuration, loaded once at start-up.

use std::time::Duration;

use serde::Deserialize;

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_get_timeout() -> u64 {
    5
}

fn default_exists_max_size() -> u64 {
    10_000
}

fn default_max_ttl_seconds() -> u64 {
    3_600
}

fn default_concurrency_limit() -> usize {
    32
}

fn default_symbol_map_capacity() -> u64 {
    50_000
}

/// Mirrors Tecken's environment variables (`SYMBOL_URLS`,
/// `SYMBOLS_GET_TIMEOUT`, `SYMBOLDOWNLOAD_EXISTS_TIMEOUT_MAXSIZE`,
/// `SYMBOLDOWNLOAD_MAX_TTL_SECONDS`) plus the ambient knobs this
/// implementation needs (bind address, log filter, concurrency cap).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub symbol_urls: String,

    #[serde(default = "default_bind")]
    pub bind_addr: String,

    #[serde(default = "default_get_timeout")]
    pub symbols_get_timeout: u64,

    #[serde(default = "default_exists_max_size")]
    pub symboldownload_exists_timeout_maxsize: u64,

    #[serde(default = "default_max_ttl_seconds")]
    pub symboldownload_max_ttl_seconds: u64,

    #[serde(default = "default_concurrency_limit")]
    pub symserv_concurrency_limit: usize,

    #[serde(default = "default_symbol_map_capacity")]
    pub symserv_symbol_map_capacity: u64,

    #[serde(default)]
    pub symserv_dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.symbols_get_timeout)
    }

    /// `SYMBOLDOWNLOAD_MAX_TTL_SECONDS`, shortened to a few seconds in
    /// development mode so manual testing doesn't wait out a full hour.
    pub fn negative_ttl(&self) -> Duration {
        if self.symserv_dev_mode {
            Duration::from_secs(5)
        } else {
            Duration::from_secs(self.symboldownload_max_ttl_seconds)
        }
    }

    pub fn existence_ttl(&self) -> Duration {
        self.negative_ttl()
    }
}
