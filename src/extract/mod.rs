//! Review extraction
//!
//! Selector strategy chains, the fallback resolver that walks them, and the
//! field heuristics that turn matched containers into review records.

pub mod fields;
pub mod record;
pub mod resolver;
pub mod strategies;

pub use record::{build, normalize_date, ReviewRecord, SOURCE_LABEL};
pub use resolver::{resolve, resolve_all, resolve_first};
pub use strategies::SelectorStrategy;
