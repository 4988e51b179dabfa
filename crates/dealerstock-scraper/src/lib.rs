pub mod adapter;
pub mod classify;
pub mod client;
pub mod error;
pub mod extract;
pub mod fields;
pub mod heuristic;
pub mod normalize;
pub mod parse;
pub mod render;
mod retry;
pub mod sources;
pub mod tiers;
pub mod types;

pub use adapter::{AdapterContext, SourceAdapter, VehicleSource};
pub use classify::{CategoryClassifier, KeywordClassifier};
pub use client::HttpFetcher;
pub use error::{ErrorKind, ScraperError};
pub use normalize::normalize_listing;
pub use render::{ChromiumRenderer, NoopRenderer, Renderer};
pub use sources::dealer_api::fetch_detail;
pub use sources::{parser_for, ListingParser};
pub use tiers::{run_chain, Tier, TierAttempt, TierOutcome};
pub use types::{RawListing, RawPrice, SourceAdapterResult};
