//! Field extraction heuristics
//!
//! Pulls individual review fields out of a container fragment. Every field
//! degrades to a sentinel instead of failing: a malformed review yields
//! placeholders, not an aborted parse.

use once_cell::sync::Lazy;
use regex::Regex;

use super::resolver;
use super::strategies;
use crate::dom::{Fragment, Queryable};

/// Title sentinel for reviews without a recognizable heading.
pub const NO_TITLE: &str = "No Title";
/// Author sentinel.
pub const ANONYMOUS: &str = "Anonymous";
/// Date sentinel.
pub const UNKNOWN_DATE: &str = "Unknown";

static RATING_NEAR_SCALE: Lazy<Regex> = Lazy::new(|| {
    // A decimal immediately followed by a scale marker, e.g. "4.2/5",
    // "4.2 out of 5", "4 stars".
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:/\s*5|out of 5|stars?)")
        .unwrap_or_else(|e| panic!("invalid rating regex: {}", e))
});

/// Review title: first element found walking the tag priority chain.
pub fn title(review: &Fragment) -> String {
    let found = resolver::resolve_first(review, strategies::TITLE)
        .map(|frag| frag.text())
        .filter(|t| !t.is_empty());
    found.unwrap_or_else(|| NO_TITLE.to_string())
}

/// Review body: the longest text among paragraph elements and content-class
/// containers. When nothing qualifies, falls back to the fragment's full
/// text with the title stripped once.
pub fn body(review: &Fragment, title: &str) -> String {
    let mut best = String::new();

    for candidate in review.select_all("p, div, span") {
        let is_paragraph = candidate.html().starts_with("<p");
        let is_content = candidate
            .attr_self("class")
            .map(|c| c.contains("content"))
            .unwrap_or(false);
        if !is_paragraph && !is_content {
            continue;
        }
        let text = candidate.text();
        if text.len() > best.len() {
            best = text;
        }
    }

    if best.is_empty() {
        let mut full = review.text();
        if !title.is_empty() && title != NO_TITLE {
            if let Some(pos) = full.find(title) {
                full.replace_range(pos..pos + title.len(), "");
            }
        }
        best = full.trim().to_string();
    }

    best
}

/// Raw date string, or the sentinel when no dated element exists.
pub fn date(review: &Fragment) -> String {
    resolver::resolve_first(review, strategies::DATE)
        .map(|frag| frag.text())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

/// Star rating.
///
/// Counts star-class glyph elements first. Failing that, scans the review
/// text for a number next to a scale marker ("4.2/5", "4 out of 5"). Zero
/// means "no rating found", never "zero stars".
pub fn rating(review: &Fragment) -> f32 {
    if let Some((_, glyphs)) = resolver::resolve(review, strategies::STARS) {
        return glyphs.len() as f32;
    }

    let text = review.text();
    if let Some(caps) = RATING_NEAR_SCALE.captures(&text) {
        if let Some(value) = caps.get(1).and_then(|m| m.as_str().parse::<f32>().ok()) {
            return value;
        }
    }

    0.0
}

/// Reviewer name, or the sentinel.
pub fn author(review: &Fragment) -> String {
    resolver::resolve_first(review, strategies::AUTHOR)
        .map(|frag| frag.text())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn review(html: &str) -> Fragment {
        Document::parse(html)
            .select_all("div.review-item")
            .remove(0)
    }

    #[test]
    fn title_prefers_headings_over_spans() {
        let r = review(
            r#"<div class="review-item">
                <span>March 31, 2025</span>
                <h3>Excellent laptop</h3>
                <p>Long body</p>
            </div>"#,
        );
        assert_eq!(title(&r), "Excellent laptop");
    }

    #[test]
    fn missing_title_yields_sentinel() {
        let r = review(r#"<div class="review-item"><p>Just a body.</p></div>"#);
        assert_eq!(title(&r), NO_TITLE);
    }

    #[test]
    fn body_picks_longest_paragraph() {
        let r = review(
            r#"<div class="review-item">
                <p>Short.</p>
                <p>This is the much longer main body of the review text.</p>
            </div>"#,
        );
        assert_eq!(body(&r, "t"), "This is the much longer main body of the review text.");
    }

    #[test]
    fn body_falls_back_to_full_text_minus_title() {
        let r = review(
            r#"<div class="review-item"><h3>Great value</h3>Works fine for the price</div>"#,
        );
        assert_eq!(body(&r, "Great value"), "Works fine for the price");
    }

    #[test]
    fn rating_counts_star_glyphs() {
        let r = review(
            r#"<div class="review-item">
                <i class="star filled"></i><i class="star filled"></i>
                <i class="star filled"></i><i class="star filled"></i>
                <p>body</p>
            </div>"#,
        );
        assert_eq!(rating(&r), 4.0);
    }

    #[test]
    fn rating_reads_text_near_scale_marker() {
        let r = review(r#"<div class="review-item"><p>Rated 4.2 out of 5 by owners</p></div>"#);
        assert_eq!(rating(&r), 4.2);

        let r = review(r#"<div class="review-item"><p>3/5 would not buy again</p></div>"#);
        assert_eq!(rating(&r), 3.0);
    }

    #[test]
    fn rating_defaults_to_zero_when_absent() {
        let r = review(r#"<div class="review-item"><p>No stars mentioned anywhere.</p></div>"#);
        assert_eq!(rating(&r), 0.0);
    }

    #[test]
    fn author_and_date_read_class_keyed_elements() {
        let r = review(
            r#"<div class="review-item">
                <span class="review-date">March 31, 2025</span>
                <span class="reviewer-name">Pat L.</span>
                <p>body</p>
            </div>"#,
        );
        assert_eq!(date(&r), "March 31, 2025");
        assert_eq!(author(&r), "Pat L.");
    }

    #[test]
    fn sentinels_for_missing_author_and_date() {
        let r = review(r#"<div class="review-item"><p>body only</p></div>"#);
        assert_eq!(author(&r), ANONYMOUS);
        assert_eq!(date(&r), UNKNOWN_DATE);
    }
}
