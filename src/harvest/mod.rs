//! Harvest orchestration
//!
//! Drives one product page end to end: navigate, filter, load every review,
//! parse. All page operations run under the resilient executor.

mod session;

pub use session::HarvestSession;

use std::time::Duration;

use crate::executor::RetryPolicy;

/// Review sort orders offered by the product page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOption {
    #[default]
    MostHelpful,
    Newest,
    HighestRating,
    LowestRating,
    MostRelevant,
}

impl FilterOption {
    /// The visible dropdown label for this sort order.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MostHelpful => "Most Helpful",
            Self::Newest => "Newest",
            Self::HighestRating => "Highest Rating",
            Self::LowestRating => "Lowest Rating",
            Self::MostRelevant => "Most Relevant",
        }
    }

    /// Menu position used by the interactive prompt (1-based).
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            1 => Some(Self::MostHelpful),
            2 => Some(Self::Newest),
            3 => Some(Self::HighestRating),
            4 => Some(Self::LowestRating),
            5 => Some(Self::MostRelevant),
            _ => None,
        }
    }
}

/// Parameters for one harvesting session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub product_url: String,
    pub filter: FilterOption,
    /// Stop loading once this many reviews are visible
    pub max_reviews: Option<usize>,
    /// Randomized pause between page actions, uniform in [min, max] ms
    pub pacing_ms: (u64, u64),
    /// Show-more click rounds before giving up
    pub max_load_more_attempts: u32,
    /// Overall wall-clock budget for the whole session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_deadline_secs: Option<u64>,
    /// Directory for debug screenshots (disabled when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_dir: Option<std::path::PathBuf>,
    pub retry: RetryPolicy,
}

impl SessionConfig {
    pub fn new(product_url: impl Into<String>) -> Self {
        Self {
            product_url: product_url.into(),
            filter: FilterOption::default(),
            max_reviews: None,
            pacing_ms: (3_000, 7_000),
            max_load_more_attempts: 5,
            overall_deadline_secs: None,
            screenshot_dir: None,
            retry: RetryPolicy::default(),
        }
    }

    pub(crate) fn overall_deadline(&self) -> Option<Duration> {
        self.overall_deadline_secs.map(Duration::from_secs)
    }
}
