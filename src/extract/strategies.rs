//! Selector strategies
//!
//! Ordered selector lists for every extraction target. Retail pages ship
//! several markup generations at once, so each target carries a priority
//! chain from most specific to most generic.

/// One named way of locating a target on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorStrategy {
    /// Stable name used in logs
    pub id: &'static str,
    /// CSS pattern
    pub pattern: &'static str,
}

/// Review container candidates, most specific first. The last entry is the
/// generic class-keyword sweep used when every structured variant misses.
pub const REVIEW_CONTAINERS: &[SelectorStrategy] = &[
    SelectorStrategy { id: "review-item", pattern: "div.review-item" },
    SelectorStrategy { id: "review-list-item", pattern: "div.review-list-item" },
    SelectorStrategy { id: "review-class", pattern: "div[class*='review']" },
    SelectorStrategy { id: "customer-review", pattern: "div.customer-review" },
    SelectorStrategy { id: "review-article", pattern: "article.review" },
    SelectorStrategy { id: "ratings-section", pattern: "div.ratings-reviews div" },
    SelectorStrategy {
        id: "keyword-sweep",
        pattern: "div[class*='review'], article[class*='review'], section[class*='review'], \
                  div[class*='rating'], article[class*='rating'], section[class*='rating'], \
                  div[class*='comment'], article[class*='comment'], section[class*='comment']",
    },
];

/// "Show more" / pagination controls that load further reviews.
pub const SHOW_MORE: &[SelectorStrategy] = &[
    SelectorStrategy { id: "show-more-button", pattern: "button.show-more-button" },
    SelectorStrategy { id: "more-button", pattern: "button[class*='more']" },
    SelectorStrategy { id: "load-button", pattern: "button[class*='load']" },
    SelectorStrategy { id: "more-link", pattern: "a[class*='more']" },
    SelectorStrategy { id: "more-span", pattern: "span[class*='more']" },
    SelectorStrategy { id: "pagination-nested", pattern: ".pagination button" },
    SelectorStrategy { id: "pagination-button", pattern: "button.pagination" },
    SelectorStrategy { id: "pagination-link", pattern: "a.pagination" },
    SelectorStrategy { id: "next-button", pattern: "button[class*='next']" },
    SelectorStrategy { id: "next-link", pattern: "a[class*='next']" },
];

/// Title candidates inside one review, in tag priority order.
pub const TITLE: &[SelectorStrategy] = &[
    SelectorStrategy { id: "title-h3", pattern: "h3" },
    SelectorStrategy { id: "title-h4", pattern: "h4" },
    SelectorStrategy { id: "title-h5", pattern: "h5" },
    SelectorStrategy { id: "title-strong", pattern: "strong" },
    SelectorStrategy { id: "title-span", pattern: "span" },
    SelectorStrategy { id: "title-div", pattern: "div" },
];

/// Date candidates: timestamp-ish tags with date-ish class names.
pub const DATE: &[SelectorStrategy] = &[
    SelectorStrategy {
        id: "date-class",
        pattern: "time[class*='date'], span[class*='date'], div[class*='date'], \
                  time[class*='time'], span[class*='time'], div[class*='time'], \
                  time[class*='when'], span[class*='when'], div[class*='when']",
    },
];

/// Star glyph candidates counted for the rating.
pub const STARS: &[SelectorStrategy] = &[
    SelectorStrategy {
        id: "star-class",
        pattern: "span[class*='star'], i[class*='star'], div[class*='star'], \
                  span[class*='rating'], i[class*='rating'], div[class*='rating'], \
                  span[class*='filled'], i[class*='filled'], div[class*='filled']",
    },
];

/// Reviewer name candidates.
pub const AUTHOR: &[SelectorStrategy] = &[
    SelectorStrategy {
        id: "author-class",
        pattern: "span[class*='author'], div[class*='author'], a[class*='author'], \
                  span[class*='reviewer'], div[class*='reviewer'], a[class*='reviewer'], \
                  span[class*='name'], div[class*='name'], a[class*='name'], \
                  span[class*='user'], div[class*='user'], a[class*='user']",
    },
];
