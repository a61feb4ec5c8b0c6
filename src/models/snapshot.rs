use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::{ErrorCode, ExtractError};
use crate::models::bar::BarSeries;

/// Lifecycle of the background worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScraperState {
    /// Ready for a new run.
    #[default]
    Idle,
    /// The worker has accepted a run.
    Started,
    /// Content is being downloaded.
    Loading,
    /// Rules or provider normalization are being applied.
    Parsing,
}

/// Immutable view of one moment of a run.
///
/// Snapshots are cloned out of the controller, so a subscriber or
/// caller can hold one for as long as it likes without observing
/// later mutations.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// The accepted source URL, `"invalid"`, or empty for inline text.
    pub source_url: String,
    /// User agent header sent with downloads.
    pub user_agent: String,
    pub state: ScraperState,
    /// Overall run progress, 0 to 100.
    pub progress_percent: u8,
    /// Download progress of the current content fetch, 0 to 100.
    pub download_percent: u8,
    /// Raw bytes of the loaded content.
    pub raw_content_bytes: Vec<u8>,
    /// Loaded content decoded as text.
    pub raw_content_text: String,
    /// Status of the last HTTP response, if a download happened.
    pub http_status: Option<u16>,
    pub last_error_code: ErrorCode,
    /// Name of the rule most recently applied.
    pub last_rule_name: Option<String>,
    /// Named extraction results in rule or fact order.
    pub fact_results: IndexMap<String, Vec<String>>,
    /// Daily bars accumulated by a history run.
    pub bar_results: BarSeries,
    /// The failure behind the last negative exceptional code.
    pub last_failure: Option<Arc<ExtractError>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_idle() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.state, ScraperState::Idle);
        assert_eq!(snapshot.last_error_code, ErrorCode::NoError);
        assert_eq!(snapshot.progress_percent, 0);
        assert!(snapshot.fact_results.is_empty());
        assert!(snapshot.bar_results.is_empty());
        assert!(snapshot.last_failure.is_none());
        assert!(snapshot.http_status.is_none());
    }

    #[test]
    fn test_clone_is_detached() {
        let mut snapshot = Snapshot::default();
        snapshot
            .fact_results
            .insert("Price".to_string(), vec!["42".to_string()]);
        let copy = snapshot.clone();
        snapshot.fact_results.clear();
        assert_eq!(copy.fact_results["Price"], vec!["42".to_string()]);
    }
}
