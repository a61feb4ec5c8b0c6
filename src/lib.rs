//! Cancellable extraction of market data from web pages and provider APIs.
//!
//! The crate is organized into focused modules:
//!
//! - [`controller`]: The [`Scraper`] background worker that drives runs
//! - [`models`]: Configuration, rules, bars and published snapshots
//! - [`engine`]: Rule application against loaded text
//! - [`provider`]: OnVista and Yahoo payload normalization
//! - [`loader`]: Pluggable content fetching
//! - [`errors`]: [`ExtractError`] and the stable [`ErrorCode`] values
//!
//! # Example
//!
//! ```no_run
//! use marketscrape::{Rule, RuleSet, ScrapeConfig, Scraper};
//!
//! let mut rules = RuleSet::new();
//! rules.add("Price", Rule::new(r#"price="([\d.]+)""#, 0, false));
//!
//! let scraper = Scraper::new();
//! scraper.subscribe(|snapshot| {
//!     println!(
//!         "{:?} {}% code {}",
//!         snapshot.state,
//!         snapshot.progress_percent,
//!         snapshot.last_error_code.as_i32()
//!     );
//! });
//! scraper.configure(ScrapeConfig::remote_text(
//!     "https://example.com/quote",
//!     "utf-8",
//!     rules,
//! ));
//! scraper.start();
//! ```

pub mod controller;
pub mod engine;
pub mod errors;
pub mod loader;
pub mod models;
pub mod provider;

pub use controller::{Scraper, SubscriptionId};
pub use errors::{ErrorCode, ExtractError};
pub use loader::{ContentLoader, FetchRequest, HttpLoader, LoadError, LoadedContent};
pub use models::{
    BarSeries, DailyBar, ProviderId, Rule, RuleOptions, RuleSet, ScrapeConfig, ScraperState,
    Snapshot, SourceKind, Strategy, ALL_MATCHES,
};
pub use provider::{
    Fact, FACT_CURRENCY, FACT_LAST_DATE, FACT_LAST_TIME, FACT_PRICE, FACT_PRICE_BEFORE,
};
