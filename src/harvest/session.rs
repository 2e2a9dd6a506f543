//! Harvest session
//!
//! One session owns one driver and walks the product page in a fixed order:
//! navigate to the reviews section, apply the sort filter, click through
//! every "show more" control, then parse whatever is on the page. Records
//! accumulate on the session so a failed run still surrenders everything
//! harvested before the failure.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{FilterOption, SessionConfig};
use crate::dom::Document;
use crate::driver::PageDriver;
use crate::error::HarvestError;
use crate::executor::ResilientExecutor;
use crate::extract::{self, strategies, ReviewRecord};
use crate::identity::{Identity, IdentityPool};

/// Selectors that find the reviews section for the scroll-into-view step.
const REVIEWS_SECTION: &str = "div[class*='customer-reviews'], section[class*='review'], \
                               section[class*='rating'], div[id*='review']";

/// Dropdown/trigger candidates for the sort filter.
const FILTER_TRIGGERS: &[&str] = &[
    "button[class*='dropdown']",
    "button[class*='filter']",
    "div[class*='dropdown']",
    "div[class*='filter']",
    "select[class*='sort']",
    "select[class*='filter']",
];

pub struct HarvestSession<'a, D: PageDriver> {
    driver: &'a D,
    identities: &'a IdentityPool,
    initial_identity: Identity,
    config: SessionConfig,
    records: Vec<ReviewRecord>,
    deadline: Option<Instant>,
}

impl<'a, D: PageDriver> HarvestSession<'a, D> {
    pub fn new(
        driver: &'a D,
        identities: &'a IdentityPool,
        initial_identity: Identity,
        config: SessionConfig,
    ) -> Self {
        Self {
            driver,
            identities,
            initial_identity,
            config,
            records: Vec::new(),
            deadline: None,
        }
    }

    /// Run the whole session. Harvested records stay on the session even
    /// when this returns an error.
    pub async fn run(&mut self) -> Result<(), HarvestError> {
        let mut executor = ResilientExecutor::new(
            self.driver,
            self.identities,
            self.initial_identity.clone(),
        );
        if let Some(budget) = self.config.overall_deadline() {
            self.deadline = Some(Instant::now() + budget);
            executor = executor.with_deadline(budget);
        }

        info!("Harvesting reviews from {}", self.config.product_url);

        self.navigate_to_product(&executor).await?;
        self.pacing_sleep().await;

        // Filter selection is tolerant: pages without the dropdown harvest
        // in default order.
        if !self.select_filter(&executor).await? {
            warn!("Sort filter not applied, harvesting in page default order");
        }

        self.load_all_reviews(&executor).await?;
        self.parse_reviews(&executor).await?;

        info!("Session complete: {} review(s) harvested", self.records.len());
        Ok(())
    }

    /// Records harvested so far (complete after a successful [`run`],
    /// partial after a failed one).
    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ReviewRecord> {
        self.records
    }

    async fn navigate_to_product(
        &self,
        executor: &ResilientExecutor<'_>,
    ) -> Result<(), HarvestError> {
        let url = self.config.product_url.clone();
        executor
            .run("navigate", &self.config.retry, || {
                let url = url.clone();
                async move {
                    self.driver.navigate(&url).await?;
                    self.pacing_sleep().await;
                    self.driver
                        .execute_script("window.scrollBy(0, 700);")
                        .await?;

                    if self.driver.element_count(REVIEWS_SECTION).await? > 0 {
                        let script = format!(
                            "document.querySelector(\"{}\")?.scrollIntoView(true);",
                            REVIEWS_SECTION.replace('"', "'")
                        );
                        self.driver.execute_script(&script).await?;
                        debug!("Scrolled reviews section into view");
                    } else {
                        // Last resort: reviews usually sit in the bottom third.
                        self.driver
                            .execute_script(
                                "window.scrollTo(0, document.body.scrollHeight * 0.7);",
                            )
                            .await?;
                        debug!("Reviews section not found, scrolled to lower page");
                    }
                    Ok(())
                }
            })
            .await?;

        self.debug_screenshot("reviews_section.png").await;
        Ok(())
    }

    /// Open the sort dropdown and pick the configured option. Returns false
    /// when the page offers no recognizable filter UI.
    async fn select_filter(
        &self,
        executor: &ResilientExecutor<'_>,
    ) -> Result<bool, HarvestError> {
        let filter = self.config.filter;
        info!("Selecting filter: {}", filter.label());

        executor
            .run("select-filter", &self.config.retry, || async move {
                let mut opened = false;
                for trigger in FILTER_TRIGGERS {
                    if self.driver.click(trigger).await.is_ok() {
                        debug!("Opened filter dropdown via {}", trigger);
                        opened = true;
                        break;
                    }
                }
                if !opened {
                    return Ok(false);
                }

                self.pacing_sleep().await;
                self.click_by_text(filter).await
            })
            .await
    }

    /// Click the first div/span/option/li whose text carries the filter
    /// label. CSS cannot match on text, so this goes through the page.
    async fn click_by_text(&self, filter: FilterOption) -> Result<bool, HarvestError> {
        let script = format!(
            r#"(() => {{
                const label = "{}";
                for (const node of document.querySelectorAll('div, span, option, li')) {{
                    if (node.textContent && node.textContent.trim().includes(label)) {{
                        node.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            filter.label()
        );

        let value = self.driver.execute_script(&script).await?;
        let clicked = value.as_bool().unwrap_or(false);
        if clicked {
            info!("Selected filter: {}", filter.label());
        }
        Ok(clicked)
    }

    /// Click "show more" until no new reviews appear, the cap is reached, or
    /// attempts run out.
    async fn load_all_reviews(
        &self,
        executor: &ResilientExecutor<'_>,
    ) -> Result<(), HarvestError> {
        let max_reviews = self.config.max_reviews;
        let max_attempts = self.config.max_load_more_attempts;

        executor
            .run("load-reviews", &self.config.retry, || async move {
                let working = self.working_container_pattern().await?;
                if working.is_none() {
                    warn!("No review containers visible before load-more loop");
                }

                let mut visible = match working {
                    Some(pattern) => self.driver.element_count(pattern).await?,
                    None => 0,
                };

                for attempt in 1..=max_attempts {
                    if let Some(cap) = max_reviews {
                        if visible >= cap {
                            info!("Reached requested maximum of {} reviews", cap);
                            break;
                        }
                    }

                    let mut clicked = false;
                    for strategy in strategies::SHOW_MORE {
                        if self.driver.click(strategy.pattern).await.is_ok() {
                            debug!(
                                "Clicked load-more control via {:?} (round {})",
                                strategy.id, attempt
                            );
                            clicked = true;
                            break;
                        }
                    }
                    if !clicked {
                        debug!("No load-more control present, all reviews loaded");
                        break;
                    }

                    self.pacing_sleep().await;

                    let now_visible = match working {
                        Some(pattern) => self.driver.element_count(pattern).await?,
                        None => 0,
                    };
                    if now_visible <= visible {
                        info!("No new reviews after load-more click, stopping");
                        break;
                    }
                    info!("Loaded {} reviews so far", now_visible);
                    visible = now_visible;
                }

                Ok(())
            })
            .await?;

        self.debug_screenshot("after_loading_reviews.png").await;
        Ok(())
    }

    /// First container strategy that currently matches anything on the page.
    async fn working_container_pattern(&self) -> Result<Option<&'static str>, HarvestError> {
        for strategy in strategies::REVIEW_CONTAINERS {
            let count = self.driver.element_count(strategy.pattern).await?;
            if count > 0 {
                debug!("Counting reviews with {:?} ({} visible)", strategy.id, count);
                return Ok(Some(strategy.pattern));
            }
        }
        Ok(None)
    }

    /// Snapshot the page and turn every matched container into a record.
    async fn parse_reviews(
        &mut self,
        executor: &ResilientExecutor<'_>,
    ) -> Result<(), HarvestError> {
        let driver = self.driver;
        let html = executor
            .run("snapshot", &self.config.retry, || async move {
                driver.current_html().await
            })
            .await?;

        let document = Document::parse(&html);
        let containers = extract::resolve_all(&document, strategies::REVIEW_CONTAINERS);
        info!("Parsing {} review container(s)", containers.len());

        for container in &containers {
            if let Some(cap) = self.config.max_reviews {
                if self.records.len() >= cap {
                    break;
                }
            }
            if let Some(record) = extract::build(container) {
                self.records.push(record);
            }
        }

        Ok(())
    }

    async fn debug_screenshot(&self, name: &str) {
        if let Some(ref dir) = self.config.screenshot_dir {
            let path = dir.join(name);
            if let Err(e) = self.driver.screenshot(&path).await {
                debug!("Debug screenshot {} failed: {}", name, e);
            }
        }
    }

    /// Human-pacing pause, uniform in the configured range and clamped to
    /// the session deadline so a long pause never outlives it.
    async fn pacing_sleep(&self) {
        let (min, max) = self.config.pacing_ms;
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        let mut pause = Duration::from_millis(ms);
        if let Some(deadline) = self.deadline {
            pause = pause.min(deadline.saturating_duration_since(Instant::now()));
        }
        tokio::time::sleep(pause).await;
    }
}
