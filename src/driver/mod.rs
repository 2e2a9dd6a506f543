//! Page driver capability
//!
//! The harvesting engine depends only on this surface, not on a specific
//! browser automation stack. `ChromeDriver` is the production implementation;
//! tests substitute canned drivers.

mod chrome;

pub use chrome::{ChromeDriver, DriverConfig};

use std::path::Path;

use async_trait::async_trait;

use crate::error::HarvestError;
use crate::identity::Identity;

/// Opaque handle to a rendered page.
///
/// All operations may fail transiently; callers are expected to wrap them in
/// the resilient executor rather than retrying ad hoc.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load event.
    async fn navigate(&self, url: &str) -> Result<(), HarvestError>;

    /// Evaluate JavaScript in the page, returning its JSON value.
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value, HarvestError>;

    /// Click the first element matching the selector.
    async fn click(&self, selector: &str) -> Result<(), HarvestError>;

    /// Number of elements currently matching the selector (0 when none).
    async fn element_count(&self, selector: &str) -> Result<usize, HarvestError>;

    /// Snapshot of the current document markup. Always recomputed; the page
    /// may change between calls.
    async fn current_html(&self) -> Result<String, HarvestError>;

    /// Save a PNG screenshot of the viewport.
    async fn screenshot(&self, path: &Path) -> Result<(), HarvestError>;

    /// Apply the live-adjustable parts of an identity (user agent,
    /// accept-language, viewport) to the running session. The proxy endpoint
    /// only takes effect on launch.
    async fn apply_identity(&self, identity: &Identity) -> Result<(), HarvestError>;

    /// Whether the underlying browser connection is still up.
    fn is_alive(&self) -> bool;
}
