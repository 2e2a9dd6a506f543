//! Review record builder
//!
//! Assembles field extractions into a stable record shape and normalizes
//! dates. Records with no meaningful content are discarded rather than
//! emitted as placeholder rows.

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use super::fields::{self, NO_TITLE, UNKNOWN_DATE};
use crate::dom::Fragment;

/// Label recorded in every harvested row.
pub const SOURCE_LABEL: &str = "BestBuy Canada";

/// One harvested customer review.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    /// Normalized to `YYYY-MM-DD` when parseable, otherwise the raw page
    /// string, or "Unknown".
    pub date: String,
    /// 0.0 means "no rating found", never "zero stars"
    pub rating: f32,
    pub author: String,
    pub source: String,
}

/// Build a record from one review container.
///
/// Returns `None` when the container carries no meaningful content (empty
/// body and no recognizable title), which filters out layout wrappers swept
/// up by the generic container strategies.
pub fn build(review: &Fragment) -> Option<ReviewRecord> {
    let title = fields::title(review);
    let body = fields::body(review, &title);

    if body.is_empty() && title == NO_TITLE {
        debug!("Discarding contentless review container");
        return None;
    }

    Some(ReviewRecord {
        id: Uuid::new_v4(),
        date: normalize_date(&fields::date(review)),
        rating: fields::rating(review),
        author: fields::author(review),
        source: SOURCE_LABEL.to_string(),
        title,
        body,
    })
}

/// Normalize page date strings to ISO.
///
/// "March 31, 2025" becomes "2025-03-31"; strings already containing a dash
/// pass through as-is; anything else unparseable is kept raw.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_DATE.to_string();
    }

    if trimmed.contains(',') {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%B %d, %Y") {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    trimmed.to_string()
}
