//! Identity pool with round-robin proxy rotation
//!
//! All rotation state (cursor plus per-endpoint health flags) lives behind
//! one lock so concurrent health probes and the harvesting session never race
//! on it.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tracing::{debug, info};

/// User agents presented to the target host. A small fixed set keeps
/// fingerprints plausible instead of unique-per-session.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Locales drawn at random per identity.
const LOCALES: &[&str] = &["en-US", "en-GB", "fr-FR", "de-DE", "es-ES", "it-IT"];

/// Viewport candidates. Width and height are drawn independently, matching
/// common desktop resolutions.
const VIEWPORT_WIDTHS: &[u32] = &[1366, 1440, 1536, 1600, 1920, 2048, 2560];
const VIEWPORT_HEIGHTS: &[u32] = &[768, 900, 1024, 1050, 1080, 1200, 1440];

/// The combination of user-agent, proxy, locale and viewport presented for
/// one session attempt. Immutable once issued.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_agent: String,
    pub proxy_endpoint: Option<String>,
    pub viewport: (u32, u32),
    pub locale: String,
}

#[derive(Debug, Clone)]
struct ProxyEndpoint {
    url: String,
    healthy: bool,
}

struct PoolInner {
    endpoints: Vec<ProxyEndpoint>,
    cursor: usize,
    issued: u64,
}

/// Rotating pool of proxy endpoints plus random identity components.
///
/// An empty pool is valid and means "direct connection".
pub struct IdentityPool {
    inner: Mutex<PoolInner>,
}

impl std::fmt::Debug for IdentityPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("IdentityPool")
            .field("endpoints", &inner.endpoints.len())
            .field("issued", &inner.issued)
            .finish()
    }
}

impl IdentityPool {
    /// Create a pool over the given proxy endpoints. All start healthy.
    pub fn new(endpoints: Vec<String>) -> Self {
        info!("IdentityPool initialized with {} proxy endpoint(s)", endpoints.len());
        Self {
            inner: Mutex::new(PoolInner {
                endpoints: endpoints
                    .into_iter()
                    .map(|url| ProxyEndpoint { url, healthy: true })
                    .collect(),
                cursor: 0,
                issued: 0,
            }),
        }
    }

    /// Create an empty pool (direct connection only).
    pub fn direct() -> Self {
        Self::new(Vec::new())
    }

    /// Issue a fresh identity: random user agent, locale and viewport plus
    /// the next healthy proxy in rotation.
    pub fn issue_identity(&self) -> Identity {
        let proxy_endpoint = self.next_proxy();

        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
        let locale = LOCALES.choose(&mut rng).copied().unwrap_or(LOCALES[0]);
        let width = VIEWPORT_WIDTHS.choose(&mut rng).copied().unwrap_or(1920);
        let height = VIEWPORT_HEIGHTS.choose(&mut rng).copied().unwrap_or(1080);

        let mut inner = self.inner.lock();
        inner.issued += 1;
        debug!(
            "Issued identity #{} (proxy: {:?}, locale: {})",
            inner.issued, proxy_endpoint, locale
        );

        Identity {
            user_agent: user_agent.to_string(),
            proxy_endpoint,
            viewport: (width, height),
            locale: locale.to_string(),
        }
    }

    /// Advance the rotation cursor to the next healthy endpoint, wrapping
    /// around. Returns `None` when the pool is empty or fully unhealthy.
    pub fn next_proxy(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let len = inner.endpoints.len();
        if len == 0 {
            return None;
        }

        for step in 0..len {
            let idx = (inner.cursor + step) % len;
            if inner.endpoints[idx].healthy {
                let url = inner.endpoints[idx].url.clone();
                inner.cursor = (idx + 1) % len;
                return Some(url);
            }
        }

        None
    }

    /// Mark an endpoint unhealthy, typically after a failed probe or a block
    /// event attributable to it. Unknown endpoints are ignored.
    pub fn mark_unhealthy(&self, endpoint: &str) {
        let mut inner = self.inner.lock();
        if let Some(ep) = inner.endpoints.iter_mut().find(|ep| ep.url == endpoint) {
            if ep.healthy {
                ep.healthy = false;
                info!("Proxy {} marked unhealthy", endpoint);
            }
        }
        // Keep the cursor resting on a healthy entry when one exists.
        let len = inner.endpoints.len();
        if len > 0 && !inner.endpoints[inner.cursor].healthy {
            for step in 0..len {
                let idx = (inner.cursor + step) % len;
                if inner.endpoints[idx].healthy {
                    inner.cursor = idx;
                    break;
                }
            }
        }
    }

    /// Re-enable an endpoint (after it passed a fresh probe).
    pub fn mark_healthy(&self, endpoint: &str) {
        let mut inner = self.inner.lock();
        if let Some(ep) = inner.endpoints.iter_mut().find(|ep| ep.url == endpoint) {
            ep.healthy = true;
        }
    }

    /// Number of endpoints currently marked healthy.
    pub fn healthy_count(&self) -> usize {
        self.inner.lock().endpoints.iter().filter(|ep| ep.healthy).count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().endpoints.is_empty()
    }
}
