//! Document capability wrappers
//!
//! Thin layer over `scraper` so the rest of the engine works against a small
//! select/text/attr surface instead of a concrete HTML library. `scraper`'s
//! node types are `!Send`, so documents are parsed synchronously from HTML
//! snapshots and never cross an await point.

use scraper::{Html, Selector};
use tracing::debug;

/// Anything selector queries can run against: a whole document or a single
/// matched fragment.
pub trait Queryable {
    /// All nodes matching the CSS pattern, in document order. Invalid
    /// patterns yield an empty set.
    fn select_all(&self, pattern: &str) -> Vec<Fragment>;

    /// Concatenated, whitespace-normalized text content.
    fn text(&self) -> String;
}

/// A parsed HTML document snapshot.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }
}

/// An opaque sub-tree matched by a selector. Owns its own markup so it stays
/// valid independently of the document it was cut from; scoped to one
/// extraction pass.
#[derive(Debug, Clone)]
pub struct Fragment {
    html: String,
    text: String,
}

impl Fragment {
    pub fn from_html(html: &str) -> Self {
        let parsed = Html::parse_fragment(html);
        let text = collect_text(parsed.root_element());
        Self {
            html: html.to_string(),
            text,
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Value of an attribute on the fragment's own root element.
    pub fn attr_self(&self, name: &str) -> Option<String> {
        let parsed = Html::parse_fragment(&self.html);
        parsed
            .root_element()
            .children()
            .filter_map(scraper::ElementRef::wrap)
            .next()
            .and_then(|el| el.value().attr(name).map(|v| v.to_string()))
    }

    /// Value of an attribute on the first node matching `pattern`.
    pub fn attr(&self, pattern: &str, name: &str) -> Option<String> {
        let selector = parse_selector(pattern)?;
        let parsed = Html::parse_fragment(&self.html);
        parsed
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr(name).map(|v| v.to_string()))
    }
}

fn parse_selector(pattern: &str) -> Option<Selector> {
    match Selector::parse(pattern) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("Skipping invalid selector pattern {:?}: {}", pattern, e);
            None
        }
    }
}

fn collect_text(el: scraper::ElementRef<'_>) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_in(html: &Html, pattern: &str) -> Vec<Fragment> {
    let Some(selector) = parse_selector(pattern) else {
        return Vec::new();
    };
    html.select(&selector)
        .map(|el| Fragment {
            html: el.html(),
            text: collect_text(el),
        })
        .collect()
}

impl Queryable for Document {
    fn select_all(&self, pattern: &str) -> Vec<Fragment> {
        select_in(&self.html, pattern)
    }

    fn text(&self) -> String {
        collect_text(self.html.root_element())
    }
}

impl Queryable for Fragment {
    /// Descendants only: the fragment's own root element never matches, so a
    /// `div` query inside a `div`-rooted fragment finds inner nodes, not the
    /// fragment itself.
    fn select_all(&self, pattern: &str) -> Vec<Fragment> {
        let Some(selector) = parse_selector(pattern) else {
            return Vec::new();
        };
        let parsed = Html::parse_fragment(&self.html);
        let own_id = parsed
            .root_element()
            .children()
            .filter_map(scraper::ElementRef::wrap)
            .next()
            .map(|el| el.id());
        parsed
            .select(&selector)
            .filter(|el| Some(el.id()) != own_id)
            .map(|el| Fragment {
                html: el.html(),
                text: collect_text(el),
            })
            .collect()
    }

    fn text(&self) -> String {
        self.text.clone()
    }
}
