//! Review Harvester
//!
//! Resilient harvesting engine for customer reviews on dynamically rendered
//! product pages behind anti-bot defenses: rotating session identities,
//! block/CAPTCHA classification, retry with identity rotation, selector
//! fallback extraction, and an offline sentiment analysis stage.

pub mod analysis;
pub mod dom;
pub mod driver;
pub mod error;
pub mod evasion;
pub mod executor;
pub mod extract;
pub mod harvest;
pub mod identity;
pub mod report;

use std::path::PathBuf;

use tracing::{error, info, warn};

use executor::RetryPolicy;

/// Harvester configuration, persisted as JSON in the user config directory.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvesterConfig {
    /// Run Chrome headless
    pub headless: bool,
    /// Explicit Chrome binary (auto-detected when unset)
    #[serde(default)]
    pub chrome_path: Option<String>,

    /// Proxy endpoints to probe and rotate through (empty = direct)
    #[serde(default)]
    pub proxies: Vec<String>,
    /// URL fetched through each proxy candidate during probing
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Human-pacing delay range between page actions
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,

    /// Show-more click rounds before giving up
    #[serde(default = "default_load_more_attempts")]
    pub max_load_more_attempts: u32,
    /// Wall-clock budget for one whole session (unset = unbounded)
    #[serde(default)]
    pub session_deadline_secs: Option<u64>,

    /// Where result files land
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Save debug screenshots alongside the results
    #[serde(default)]
    pub debug_screenshots: bool,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_probe_url() -> String {
    "https://www.google.com".to_string()
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_load_more_attempts() -> u32 {
    5
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("harvest_results")
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            proxies: vec![],
            probe_url: default_probe_url(),
            probe_timeout_secs: default_probe_timeout(),
            min_delay_ms: 3000,
            max_delay_ms: 7000,
            max_load_more_attempts: default_load_more_attempts(),
            session_deadline_secs: None,
            output_dir: default_output_dir(),
            debug_screenshots: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("review-harvester").join("logs"))
}

impl HarvesterConfig {
    /// Get config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("review-harvester").join("config.json"))
    }

    /// Load config from file
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str(&content) {
                        Ok(config) => {
                            info!("Loaded config from {:?}", path);
                            return config;
                        }
                        Err(e) => {
                            warn!("Failed to parse config file: {}", e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read config file: {}", e);
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!("Failed to create config directory: {}", e);
                    return;
                }
            }

            match serde_json::to_string_pretty(self) {
                Ok(content) => {
                    if let Err(e) = std::fs::write(&path, content) {
                        error!("Failed to save config: {}", e);
                    } else {
                        info!("Config saved to {:?}", path);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize config: {}", e);
                }
            }
        }
    }

    /// Session parameters derived from this config.
    pub fn session_config(&self, product_url: &str) -> harvest::SessionConfig {
        let mut session = harvest::SessionConfig::new(product_url);
        session.pacing_ms = (self.min_delay_ms, self.max_delay_ms);
        session.max_load_more_attempts = self.max_load_more_attempts;
        session.overall_deadline_secs = self.session_deadline_secs;
        session.retry = self.retry.clone();
        if self.debug_screenshots {
            session.screenshot_dir = Some(self.output_dir.clone());
        }
        session
    }
}

/// Initialize logging: console layer plus a daily-rolling file when the log
/// directory is writable.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "review-harvester.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
