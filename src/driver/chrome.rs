//! Chrome driver
//!
//! Launches and controls a single Chrome instance over CDP. One driver maps
//! to one harvesting session; identity rotation re-applies what CDP can
//! change live (user agent, language, viewport) while the proxy endpoint is
//! fixed at launch.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::PageDriver;
use crate::error::HarvestError;
use crate::identity::Identity;

/// Find a Chrome/Chromium executable on the system.
fn find_chrome() -> Option<std::path::PathBuf> {
    let candidates: Vec<std::path::PathBuf> = if cfg!(target_os = "windows") {
        let mut paths = vec![
            std::path::PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            std::path::PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            paths.push(std::path::PathBuf::from(format!(
                r"{}\Google\Chrome\Application\chrome.exe",
                local
            )));
        }
        paths
    } else if cfg!(target_os = "macos") {
        vec![std::path::PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        )]
    } else {
        vec![
            std::path::PathBuf::from("/usr/bin/google-chrome"),
            std::path::PathBuf::from("/usr/bin/google-chrome-stable"),
            std::path::PathBuf::from("/usr/bin/chromium"),
            std::path::PathBuf::from("/usr/bin/chromium-browser"),
        ]
    };

    candidates.into_iter().find(|p| p.exists())
}

/// Configuration for a Chrome driver session
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Path to Chrome/Chromium executable (auto-detected when unset)
    pub chrome_path: Option<String>,
    /// Run in headless mode
    pub headless: bool,
    /// User data directory
    pub user_data_dir: Option<String>,
    /// Per-request CDP timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            user_data_dir: None,
            timeout_secs: 60,
        }
    }
}

impl DriverConfig {
    /// Config with a fresh data directory for the given session id.
    pub fn for_session(session_id: &str) -> Self {
        let dir = std::env::temp_dir()
            .join("review-harvester")
            .join("browser_data")
            .join(session_id);

        Self {
            user_data_dir: Some(dir.to_string_lossy().to_string()),
            ..Default::default()
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn chrome_path(mut self, path: Option<String>) -> Self {
        self.chrome_path = path;
        self
    }
}

/// A live Chrome session implementing the page-driver capability.
pub struct ChromeDriver {
    browser: RwLock<Option<Browser>>,
    page: RwLock<Option<Page>>,
    alive: Arc<AtomicBool>,
    config: DriverConfig,
}

impl ChromeDriver {
    /// Launch Chrome with the session identity baked in (proxy, viewport,
    /// user agent) and stealth flags applied.
    pub async fn launch(config: DriverConfig, identity: &Identity) -> Result<Self, HarvestError> {
        if config.chrome_path.is_none() && find_chrome().is_none() {
            return Err(HarvestError::LaunchFailed(
                "Chrome not found. Install Google Chrome or Chromium and retry.".to_string(),
            ));
        }

        info!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, identity.proxy_endpoint
        );

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(config.timeout_secs))
            .no_sandbox();

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        } else if let Some(path) = find_chrome() {
            debug!("Auto-detected Chrome at: {}", path.display());
            builder = builder.chrome_executable(path);
        }

        if let Some(ref dir) = config.user_data_dir {
            let _ = std::fs::create_dir_all(dir);
            builder = builder.user_data_dir(dir);
        }

        // Anti-detection flags (undetected-chromedriver style) plus UI
        // suppression so no prompt ever steals focus from the automation.
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-default-browser-check")
            .arg("--disable-session-crashed-bubble")
            .arg("--disable-restore-session-state")
            .arg("--disable-site-isolation-trials")
            .arg("--disable-notifications")
            .arg("--disable-translate")
            .arg("--disable-domain-reliability")
            .arg("--disable-component-update")
            .arg("--disable-dev-shm-usage");

        if let Some(ref proxy) = identity.proxy_endpoint {
            let server = if proxy.contains("://") {
                proxy.clone()
            } else {
                format!("http://{}", proxy)
            };
            builder = builder.arg(format!("--proxy-server={}", server));
        }

        let (width, height) = identity.viewport;
        builder = builder.window_size(width, height);

        let browser_config = builder
            .build()
            .map_err(HarvestError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| HarvestError::LaunchFailed(e.to_string()))?;

        // When the handler stream ends, Chrome has disconnected or crashed.
        let alive = Arc::new(AtomicBool::new(true));
        let alive_for_handler = alive.clone();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            warn!("Chrome disconnected (event handler ended)");
            alive_for_handler.store(false, Ordering::Relaxed);
        });

        // Adopt the initial blank tab, close any extras.
        let page = {
            let mut pages = browser
                .pages()
                .await
                .map_err(|e| HarvestError::LaunchFailed(e.to_string()))?;

            let main_page = if !pages.is_empty() {
                pages.remove(0)
            } else {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| HarvestError::LaunchFailed(e.to_string()))?
            };

            for extra in pages {
                debug!("Closing extra blank tab");
                let _ = extra.close().await;
            }

            main_page
        };

        let driver = Self {
            browser: RwLock::new(Some(browser)),
            page: RwLock::new(Some(page)),
            alive,
            config,
        };

        driver.apply_identity(identity).await?;

        info!("Browser session ready ({}x{}, locale: {})", width, height, identity.locale);
        Ok(driver)
    }

    async fn with_page<T, F, Fut>(&self, f: F) -> Result<T, HarvestError>
    where
        F: FnOnce(Page) -> Fut,
        Fut: std::future::Future<Output = Result<T, HarvestError>>,
    {
        let guard = self.page.read().await;
        let page = guard
            .as_ref()
            .ok_or_else(|| HarvestError::TransientPage("no active page".into()))?
            .clone();
        drop(guard);
        f(page).await
    }

    /// Close the browser session, force-killing Chrome if the graceful close
    /// leaves processes behind.
    pub async fn close(&self) -> Result<(), HarvestError> {
        self.alive.store(false, Ordering::Relaxed);

        {
            let mut page = self.page.write().await;
            if let Some(p) = page.take() {
                let _ = p.close().await;
            }
        }

        {
            let mut browser = self.browser.write().await;
            if let Some(mut b) = browser.take() {
                let _ = b.close().await;
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = b.kill().await;
            }
        }

        info!("Browser session closed");
        Ok(())
    }

    fn accept_language(locale: &str) -> String {
        let lang = locale.split('-').next().unwrap_or("en");
        if locale.starts_with("en") {
            format!("{},{};q=0.9", locale, lang)
        } else {
            format!("{},{};q=0.9,en-US;q=0.8,en;q=0.7", locale, lang)
        }
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<(), HarvestError> {
        debug!("Navigating to: {}", url);
        let url = url.to_string();
        self.with_page(|page| async move {
            page.goto(&url)
                .await
                .map_err(|e| HarvestError::TransientPage(format!("navigation failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn execute_script(&self, script: &str) -> Result<serde_json::Value, HarvestError> {
        let script = script.to_string();
        self.with_page(|page| async move {
            let result = page
                .evaluate(script)
                .await
                .map_err(|e| HarvestError::TransientPage(format!("script failed: {}", e)))?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), HarvestError> {
        let selector = selector.to_string();
        self.with_page(|page| async move {
            let element = page
                .find_element(&selector)
                .await
                .map_err(|e| HarvestError::TransientPage(format!("{}: {}", selector, e)))?;
            element
                .click()
                .await
                .map_err(|e| HarvestError::TransientPage(format!("click failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn element_count(&self, selector: &str) -> Result<usize, HarvestError> {
        let selector = selector.to_string();
        self.with_page(|page| async move {
            match page.find_elements(&selector).await {
                Ok(elements) => Ok(elements.len()),
                // find_elements errors when nothing matches; that is just zero.
                Err(_) => Ok(0),
            }
        })
        .await
    }

    async fn current_html(&self) -> Result<String, HarvestError> {
        self.with_page(|page| async move {
            page.content()
                .await
                .map_err(|e| HarvestError::TransientPage(format!("content snapshot failed: {}", e)))
        })
        .await
    }

    async fn screenshot(&self, path: &Path) -> Result<(), HarvestError> {
        let path = path.to_path_buf();
        self.with_page(|page| async move {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            page.save_screenshot(params, &path)
                .await
                .map_err(|e| HarvestError::TransientPage(format!("screenshot failed: {}", e)))?;
            debug!("Saved screenshot to {}", path.display());
            Ok(())
        })
        .await
    }

    async fn apply_identity(&self, identity: &Identity) -> Result<(), HarvestError> {
        let user_agent = identity.user_agent.clone();
        let accept_language = Self::accept_language(&identity.locale);
        let (width, height) = identity.viewport;

        self.with_page(|page| async move {
            let ua_params = SetUserAgentOverrideParams::builder()
                .user_agent(&user_agent)
                .accept_language(&accept_language)
                .build()
                .map_err(HarvestError::TransientPage)?;
            page.execute(ua_params)
                .await
                .map_err(|e| HarvestError::TransientPage(format!("UA override failed: {}", e)))?;

            let headers = Headers::new(serde_json::json!({
                "Accept-Language": accept_language,
            }));
            page.execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(|e| HarvestError::TransientPage(format!("header override failed: {}", e)))?;

            let metrics = SetDeviceMetricsOverrideParams::builder()
                .width(width as i64)
                .height(height as i64)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(HarvestError::TransientPage)?;
            page.execute(metrics)
                .await
                .map_err(|e| HarvestError::TransientPage(format!("viewport override failed: {}", e)))?;

            debug!("Identity applied (UA + Accept-Language + {}x{})", width, height);
            Ok(())
        })
        .await
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ChromeDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeDriver")
            .field("headless", &self.config.headless)
            .field("alive", &self.is_alive())
            .finish()
    }
}
