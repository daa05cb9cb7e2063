//! Topology source adapters.
//!
//! A [`TopologySource`] returns one [`RawTopology`] per call and does no
//! graph work at all. [`RyuRestSource`] talks to a Ryu-style controller over
//! HTTP; [`StaticSource`] replays a fixed payload for offline runs.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;

use sdntwin_core::{RawHostsPayload, RawLink, RawSwitch, RawTopology};

use crate::error::SourceError;

/// The controller's query interface, as seen by the scheduler.
pub trait TopologySource: Send + Sync {
    /// Fetches the current switches, links and hosts.
    fn fetch(&self) -> impl Future<Output = Result<RawTopology, SourceError>> + Send;
}

// ---------------------------------------------------------------------------
// Ryu REST
// ---------------------------------------------------------------------------

/// REST adapter for `/v1.0/topology/{switches,links,hosts}`.
#[derive(Debug, Clone)]
pub struct RyuRestSource {
    client: reqwest::Client,
    base_url: String,
}

impl RyuRestSource {
    /// Creates an adapter whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| SourceError::unreachable(base_url, format!("client setup failed: {err}")))?;
        Ok(RyuRestSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str) -> Result<T, SourceError> {
        let endpoint = format!("{}/v1.0/topology/{}", self.base_url, resource);

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|err| SourceError::unreachable(&endpoint, describe(&err)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::unreachable(
                &endpoint,
                format!("controller answered {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| SourceError::unreachable(&endpoint, describe(&err)))?;

        serde_json::from_slice(&body).map_err(|err| SourceError::malformed(&endpoint, err.to_string()))
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    }
}

impl TopologySource for RyuRestSource {
    async fn fetch(&self) -> Result<RawTopology, SourceError> {
        let switches: Vec<RawSwitch> = self.get("switches").await?;
        let links: Vec<RawLink> = self.get("links").await?;
        let hosts: RawHostsPayload = self.get("hosts").await?;

        tracing::debug!(
            switches = switches.len(),
            links = links.len(),
            "fetched topology from controller"
        );
        Ok(RawTopology {
            switches,
            links,
            hosts: hosts.into_hosts(),
        })
    }
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

/// A source that always returns the same payload.
#[derive(Debug, Clone)]
pub struct StaticSource {
    raw: RawTopology,
}

impl StaticSource {
    pub fn new(raw: RawTopology) -> Self {
        StaticSource { raw }
    }

    /// Loads a payload file with `switches`, `links` and `hosts` sections.
    pub fn from_json_file(path: &Path) -> Result<Self, SourceError> {
        let endpoint = path.display().to_string();
        let bytes =
            std::fs::read(path).map_err(|err| SourceError::unreachable(&endpoint, err.to_string()))?;
        let raw = serde_json::from_slice(&bytes)
            .map_err(|err| SourceError::malformed(&endpoint, err.to_string()))?;
        Ok(StaticSource { raw })
    }
}

impl TopologySource for StaticSource {
    async fn fetch(&self) -> Result<RawTopology, SourceError> {
        Ok(self.raw.clone())
    }
}
