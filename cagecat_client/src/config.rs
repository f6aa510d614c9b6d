//! Client configuration.
//!
//! # Environment variables
//!
//! | Variable                       | Default                               |
//! |--------------------------------|---------------------------------------|
//! | `CAGECAT_BASE_URL`             | `https://cagecat.bioinformatics.nl/`  |
//! | `CAGECAT_HISTORY_FILE`         | `cagecat_history.json`                |
//! | `CAGECAT_STATUS_INTERVAL_MS`   | `15000`                               |
//! | `CAGECAT_STAGE_INTERVAL_MS`    | `5000`                                |
//! | `CAGECAT_REQUEST_TIMEOUT_SECS` | `30`                                  |
//!
//! A `.env` file is honoured by the binary. Command line flags win over
//! both.

use std::path::PathBuf;
use std::time::Duration;

use crate::poller::{STAGE_INTERVAL, STATUS_INTERVAL};

pub const DEFAULT_BASE_URL: &str = "https://cagecat.bioinformatics.nl/";
pub const DEFAULT_HISTORY_FILE: &str = "cagecat_history.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub history_file: PathBuf,
    pub status_interval: Duration,
    pub stage_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            history_file: PathBuf::from(DEFAULT_HISTORY_FILE),
            status_interval: STATUS_INTERVAL,
            stage_interval: STAGE_INTERVAL,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source. Unparsable numbers fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let millis = |key: &str, default: Duration| {
            parse_number(key, lookup(key))
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            base_url: lookup("CAGECAT_BASE_URL").unwrap_or(defaults.base_url),
            history_file: lookup("CAGECAT_HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_file),
            status_interval: millis("CAGECAT_STATUS_INTERVAL_MS", defaults.status_interval),
            stage_interval: millis("CAGECAT_STAGE_INTERVAL_MS", defaults.stage_interval),
            request_timeout: parse_number(
                "CAGECAT_REQUEST_TIMEOUT_SECS",
                lookup("CAGECAT_REQUEST_TIMEOUT_SECS"),
            )
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout),
        }
    }
}

fn parse_number(key: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring non-numeric setting");
            None
        }
    }
}
