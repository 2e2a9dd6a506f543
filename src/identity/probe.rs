//! Proxy connectivity probing
//!
//! Candidate endpoints come from an external source and are verified with a
//! bounded number of concurrent HTTP probes before entering the pool.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::HarvestError;

/// Upper bound on simultaneous probes, so a long candidate list never turns
/// into a connection flood.
const MAX_CONCURRENT_PROBES: usize = 20;

/// Source of candidate proxy endpoints (`host:port` strings). The engine
/// only consumes the list; where it comes from is the caller's business.
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<String>, HarvestError>;
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Known-reachable URL the probe fetches through each candidate.
    pub test_url: String,
    /// Per-probe timeout. Slow proxies are not worth keeping.
    pub timeout: Duration,
    /// At most this many candidates are tested, to bound cost.
    pub max_candidates: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            test_url: "https://www.google.com".to_string(),
            timeout: Duration::from_secs(5),
            max_candidates: 20,
        }
    }
}

/// Probe candidate endpoints and return the ones that answered with a
/// success status inside the timeout. Order of the result follows the
/// input order, not probe completion order.
pub async fn probe_candidates(candidates: &[String], config: &ProbeConfig) -> Vec<String> {
    let limit = candidates.len().min(config.max_candidates);
    let to_test = &candidates[..limit];
    if to_test.is_empty() {
        return Vec::new();
    }

    info!("Probing {} proxy candidate(s)", to_test.len());

    let results: Vec<(usize, bool)> = stream::iter(to_test.iter().enumerate())
        .map(|(idx, endpoint)| {
            let endpoint = endpoint.clone();
            let test_url = config.test_url.clone();
            let timeout = config.timeout;
            async move {
                let ok = probe_one(&endpoint, &test_url, timeout).await;
                (idx, ok)
            }
        })
        .buffer_unordered(MAX_CONCURRENT_PROBES)
        .collect()
        .await;

    let mut healthy: Vec<(usize, String)> = results
        .into_iter()
        .filter(|(_, ok)| *ok)
        .map(|(idx, _)| (idx, to_test[idx].clone()))
        .collect();
    healthy.sort_by_key(|(idx, _)| *idx);

    info!("{}/{} proxy candidates passed the probe", healthy.len(), to_test.len());
    healthy.into_iter().map(|(_, url)| url).collect()
}

async fn probe_one(endpoint: &str, test_url: &str, timeout: Duration) -> bool {
    let proxy_url = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };

    let proxy = match reqwest::Proxy::all(&proxy_url) {
        Ok(p) => p,
        Err(e) => {
            warn!("Invalid proxy endpoint {}: {}", endpoint, e);
            return false;
        }
    };

    let client = match reqwest::Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to build probe client for {}: {}", endpoint, e);
            return false;
        }
    };

    match client.get(test_url).send().await {
        Ok(resp) if resp.status().is_success() => {
            debug!("Proxy {} is working", endpoint);
            true
        }
        Ok(resp) => {
            debug!("Proxy {} answered HTTP {}", endpoint, resp.status());
            false
        }
        Err(e) => {
            debug!("Proxy {} failed probe: {}", endpoint, e);
            false
        }
    }
}

/// A fixed, pre-configured candidate list. Useful for config-file driven
/// runs and as the test double for the source seam.
pub struct StaticProxySource {
    candidates: Vec<String>,
}

impl StaticProxySource {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl ProxySource for StaticProxySource {
    async fn fetch_candidates(&self) -> Result<Vec<String>, HarvestError> {
        Ok(self.candidates.clone())
    }
}
