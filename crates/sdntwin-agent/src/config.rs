//! Runtime configuration.
//!
//! Defaults can be overridden by a JSON file and then by CLI flags or
//! `SDNTWIN_*` environment variables (see the `sdntwin` binary). Durations
//! are stored in milliseconds to keep the file format plain.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TwinError;

/// Operating mode, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Poll on an interval and re-render on every commit until stopped.
    Realtime,
    /// One acquisition, one render, then stop.
    Snapshot,
}

/// Exponential backoff applied to failed polls in real-time mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
    /// Consecutive failures tolerated before giving up.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            initial_ms: 500,
            max_ms: 30_000,
            max_retries: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`,
    /// capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self.initial_ms.saturating_mul(factor).min(self.max_ms);
        Duration::from_millis(ms)
    }
}

/// Configuration shared by both modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinConfig {
    /// Base URL of the controller's REST API.
    pub controller_url: String,
    pub poll_interval_ms: u64,
    /// Upper bound on one fetch, including all its requests.
    pub fetch_timeout_ms: u64,
    /// Consecutive absent polls before a node or edge is removed.
    pub debounce_polls: u32,
    pub backoff: BackoffPolicy,
}

impl Default for TwinConfig {
    fn default() -> Self {
        TwinConfig {
            controller_url: "http://127.0.0.1:8080".to_string(),
            poll_interval_ms: 1_000,
            fetch_timeout_ms: 5_000,
            debounce_polls: 3,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl TwinConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, TwinError> {
        let text = std::fs::read_to_string(path).map_err(|e| TwinError::Config {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&text).map_err(|e| TwinError::Config {
            reason: format!("cannot parse {}: {}", path.display(), e),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Rejects values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), TwinError> {
        let problem = if self.controller_url.trim().is_empty() {
            Some("controller_url must not be empty")
        } else if self.poll_interval_ms == 0 {
            Some("poll_interval_ms must be greater than zero")
        } else if self.fetch_timeout_ms == 0 {
            Some("fetch_timeout_ms must be greater than zero")
        } else if self.debounce_polls == 0 {
            Some("debounce_polls must be at least 1")
        } else if self.backoff.initial_ms > self.backoff.max_ms {
            Some("backoff.initial_ms must not exceed backoff.max_ms")
        } else {
            None
        };
        match problem {
            Some(reason) => Err(TwinError::Config {
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}
