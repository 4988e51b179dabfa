pub mod aggregator;
pub mod cache;
pub mod detail;
pub mod service;

pub use aggregator::{dedup_key, AggregationReport, Aggregator, SourceSummary};
pub use cache::{CacheEntry, Clock, ManualClock, SystemClock, TtlMap, TtlSlot};
pub use detail::{validate_vid, ApiDetailSource, DetailError, DetailFetcher, DetailSource};
pub use service::{InventoryService, UNAVAILABLE};
