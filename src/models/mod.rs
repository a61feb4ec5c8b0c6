//! Data model for configuration, rules, results and published snapshots.

pub mod bar;
pub mod config;
pub mod rules;
pub mod snapshot;

pub use bar::{BarSeries, DailyBar};
pub use config::{ProviderId, ScrapeConfig, SourceKind, Strategy};
pub use rules::{Rule, RuleOptions, RuleSet, ALL_MATCHES};
pub use snapshot::{ScraperState, Snapshot};
