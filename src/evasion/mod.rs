//! Evasion controller
//!
//! Classifies rendered pages into clean / blocked / CAPTCHA-challenged and
//! applies per-identity fingerprint preparation before an attempt runs.

use tracing::{debug, warn};

use crate::dom::{Document, Queryable};
use crate::driver::PageDriver;
use crate::error::HarvestError;
use crate::identity::Identity;

/// Phrases that indicate an anti-bot interstitial rather than real content.
/// Matched case-insensitively against the full page text.
pub const BLOCK_PHRASES: &[&str] = &[
    "captcha",
    "security check",
    "access denied",
    "blocked",
    "rate limit",
    "too many requests",
    "unusual activity",
    "suspicious activity",
    "detected unusual traffic",
];

/// Structural markers for an interactive CAPTCHA widget.
pub const CAPTCHA_MARKERS: &[&str] = &[
    "iframe[src*=\"recaptcha\"]",
    "iframe[src*=\"hcaptcha\"]",
    ".g-recaptcha",
    ".h-captcha",
    "input#captcha",
];

/// Script injected before attempts to hide the automation flag.
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
"#;

/// What the page currently looks like from a defense standpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Normal content, safe to extract from
    Clean,
    /// Anti-bot interstitial or hard block without a solvable challenge
    Blocked,
    /// An interactive CAPTCHA widget is present
    CaptchaChallenged,
}

/// Classify a rendered HTML snapshot.
///
/// CAPTCHA markers win over bare block phrases: the word "captcha" in page
/// text plus a widget means a solvable challenge, not a hard block.
pub fn classify_html(html: &str) -> PageState {
    let doc = Document::parse(html);

    for marker in CAPTCHA_MARKERS {
        if !doc.select_all(marker).is_empty() {
            debug!("CAPTCHA widget detected via marker: {}", marker);
            return PageState::CaptchaChallenged;
        }
    }

    let text = doc.text().to_lowercase();
    for phrase in BLOCK_PHRASES {
        if text.contains(phrase) {
            debug!("Block phrase detected in page text: {:?}", phrase);
            return PageState::Blocked;
        }
    }

    PageState::Clean
}

/// Snapshot the live page and classify it.
pub async fn classify(driver: &dyn PageDriver) -> Result<PageState, HarvestError> {
    let html = driver.current_html().await?;
    Ok(classify_html(&html))
}

/// Apply identity fingerprints and stealth patches to the live session.
///
/// Preparation is best effort: a failed override is logged and skipped so a
/// flaky CDP call never kills an otherwise viable attempt.
pub async fn prepare(driver: &dyn PageDriver, identity: &Identity) {
    if let Err(e) = driver.apply_identity(identity).await {
        warn!("Identity override failed, continuing with current fingerprint: {}", e);
    }

    if let Err(e) = driver.execute_script(STEALTH_SCRIPT).await {
        warn!("Stealth script injection failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_page_classifies_clean() {
        let html = r#"<html><body>
            <h1>Customer Reviews</h1>
            <div class="review-item"><p>Great laptop, fast shipping.</p></div>
        </body></html>"#;
        assert_eq!(classify_html(html), PageState::Clean);
    }

    #[test]
    fn block_phrase_in_text_classifies_blocked() {
        let html = "<html><body><h1>Access Denied</h1><p>You don't have permission.</p></body></html>";
        assert_eq!(classify_html(html), PageState::Blocked);

        let html = "<html><body><p>We detected unusual traffic from your network.</p></body></html>";
        assert_eq!(classify_html(html), PageState::Blocked);
    }

    #[test]
    fn captcha_widget_wins_over_block_phrase() {
        // Page text says "security check" but a real widget is present, so
        // the challenge is solvable and must classify as CAPTCHA.
        let html = r#"<html><body>
            <h1>Security check</h1>
            <div class="g-recaptcha" data-sitekey="abc"></div>
        </body></html>"#;
        assert_eq!(classify_html(html), PageState::CaptchaChallenged);
    }

    #[test]
    fn recaptcha_iframe_detected() {
        let html = r#"<html><body>
            <iframe src="https://www.google.com/recaptcha/api2/anchor?k=x"></iframe>
        </body></html>"#;
        assert_eq!(classify_html(html), PageState::CaptchaChallenged);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let html = "<html><body><p>TOO MANY REQUESTS from this address.</p></body></html>";
        assert_eq!(classify_html(html), PageState::Blocked);
    }
}
