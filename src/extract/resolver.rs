//! Selector fallback resolver
//!
//! Walks an ordered strategy chain and commits to the first strategy that
//! matches anything. No cross-strategy merging: mixing markup generations
//! produces duplicate or phantom hits, so one generation wins outright.

use tracing::{debug, warn};

use super::strategies::SelectorStrategy;
use crate::dom::{Fragment, Queryable};

/// Resolve a target within `scope`, trying strategies in priority order.
///
/// Returns the winning strategy and its matches, or `None` when the whole
/// chain misses. A miss is data ("nothing there"), never an error.
pub fn resolve<'s>(
    scope: &impl Queryable,
    strategies: &'s [SelectorStrategy],
) -> Option<(&'s SelectorStrategy, Vec<Fragment>)> {
    for strategy in strategies {
        let matches = scope.select_all(strategy.pattern);
        if !matches.is_empty() {
            debug!("Strategy {:?} matched {} node(s)", strategy.id, matches.len());
            return Some((strategy, matches));
        }
    }
    None
}

/// Like [`resolve`], but flattens the all-miss case to an empty set and logs
/// it, for call sites that only care about the fragments.
pub fn resolve_all(scope: &impl Queryable, strategies: &[SelectorStrategy]) -> Vec<Fragment> {
    match resolve(scope, strategies) {
        Some((_, matches)) => matches,
        None => {
            warn!("All {} strategies missed", strategies.len());
            Vec::new()
        }
    }
}

/// First match only, for single-valued targets (title, date, author).
pub fn resolve_first(scope: &impl Queryable, strategies: &[SelectorStrategy]) -> Option<Fragment> {
    resolve(scope, strategies).and_then(|(_, mut matches)| {
        if matches.is_empty() {
            None
        } else {
            Some(matches.remove(0))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    const CHAIN: &[SelectorStrategy] = &[
        SelectorStrategy { id: "primary", pattern: "div.review-item" },
        SelectorStrategy { id: "secondary", pattern: "div.review-card" },
        SelectorStrategy { id: "generic", pattern: "div[class*='review']" },
    ];

    #[test]
    fn first_matching_strategy_wins_outright() {
        // The second strategy matches 3 nodes; the generic one would match 5
        // (those 3 plus 2 stale wrappers). The chain must commit to the 3.
        let doc = Document::parse(
            r#"<body>
                <div class="review-card">a</div>
                <div class="review-card">b</div>
                <div class="review-card">c</div>
                <div class="review-wrapper">x</div>
                <div class="review-legacy">y</div>
            </body>"#,
        );

        let (strategy, matches) = resolve(&doc, CHAIN).unwrap();
        assert_eq!(strategy.id, "secondary");
        assert_eq!(matches.len(), 3);
    }

    #[test]
    fn falls_through_to_later_strategies() {
        let doc = Document::parse(r#"<div class="review-legacy">only</div>"#);
        let (strategy, matches) = resolve(&doc, CHAIN).unwrap();
        assert_eq!(strategy.id, "generic");
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn all_miss_is_none_not_error() {
        let doc = Document::parse("<div class='product-specs'>nothing here</div>");
        assert!(resolve(&doc, CHAIN).is_none());
        assert!(resolve_all(&doc, CHAIN).is_empty());
    }

    #[test]
    fn resolve_first_takes_document_order() {
        let doc = Document::parse(
            r#"<div class="review-item">first</div><div class="review-item">second</div>"#,
        );
        let frag = resolve_first(&doc, CHAIN).unwrap();
        assert_eq!(frag.text(), "first");
    }
}
