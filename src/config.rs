//! Server configuration from `NESTBOOK_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// JSON file of `{token, id, name, email, image}` entries.
    pub users_file: Option<PathBuf>,
    pub max_connections: usize,
    pub request_timeout: Duration,
    /// WAL appends between compactions.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            users_file: None,
            max_connections: 256,
            request_timeout: Duration::from_secs(30),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read the process environment. Unparseable numbers fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind: get("NESTBOOK_BIND").unwrap_or(defaults.bind),
            port: parse_var(&get, "NESTBOOK_PORT").unwrap_or(defaults.port),
            data_dir: get("NESTBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            users_file: get("NESTBOOK_USERS_FILE")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            max_connections: parse_var(&get, "NESTBOOK_MAX_CONNECTIONS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_connections),
            request_timeout: parse_var(&get, "NESTBOOK_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            compact_threshold: parse_var(&get, "NESTBOOK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            metrics_port: parse_var(&get, "NESTBOOK_METRICS_PORT"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("nestbook.wal")
    }
}

fn parse_var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.trim().parse().ok())
}
