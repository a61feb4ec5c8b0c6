//! The background extraction controller.
//!
//! A [`Scraper`] owns one dedicated worker thread for its whole life.
//! `start()` hands the configured job to the worker and returns
//! immediately; the worker walks through loading and extraction,
//! publishing an immutable [`Snapshot`] to every subscriber after each
//! observable step. Cancellation is cooperative: `cancel()` raises a
//! flag the worker polls at its checkpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine;
use crate::errors::{ErrorCode, ExtractError};
use crate::loader::{ContentLoader, FetchRequest, HttpLoader};
use crate::models::{
    ProviderId, ScrapeConfig, ScraperState, Snapshot, SourceKind, Strategy,
};
use crate::provider::{onvista, yahoo, Fact};

/// How often the idle worker looks for a pending run.
const IDLE_POLL: Duration = Duration::from_millis(10);
/// Pause after each extraction step so a cancellation can land.
const CANCEL_WINDOW: Duration = Duration::from_millis(25);
/// Progress published when the download phase begins.
const LOAD_STARTED_PERCENT: u8 = 5;
/// Progress published when content is fully available.
const LOAD_FINISHED_PERCENT: u8 = 10;
/// Progress at which extraction begins.
const SEARCH_BASE_PERCENT: u8 = 15;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:36.0) Gecko/20100101 Firefox/36.0";

/// Handle returned by [`Scraper::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&Snapshot) + Send + Sync + 'static>;

/// State behind the controller's coarse lock.
struct Shared {
    running: bool,
    cancel: bool,
    shutdown: bool,
    config: Option<ScrapeConfig>,
    snapshot: Snapshot,
}

struct Inner {
    shared: Mutex<Shared>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_subscription: AtomicU64,
    loader: Box<dyn ContentLoader>,
}

/// Cancellable background extraction controller.
///
/// Dropping the scraper shuts the worker thread down and joins it; an
/// active run is cancelled at its next checkpoint.
pub struct Scraper {
    inner: Arc<Inner>,
    worker: Option<JoinHandle<()>>,
}

impl Scraper {
    pub fn new() -> Self {
        Self::with_loader(Box::new(HttpLoader::new()))
    }

    /// Builds a controller around a custom content loader.
    pub fn with_loader(loader: Box<dyn ContentLoader>) -> Self {
        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared {
                running: false,
                cancel: false,
                shutdown: false,
                config: None,
                snapshot: Snapshot {
                    user_agent: DEFAULT_USER_AGENT.to_string(),
                    ..Snapshot::default()
                },
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            loader,
        });
        let worker_inner = Arc::clone(&inner);
        let worker = thread::spawn(move || worker_loop(worker_inner));
        Self {
            inner,
            worker: Some(worker),
        }
    }

    /// Installs the job the next `start()` will run. May be called
    /// again at any time; an active run keeps the configuration it
    /// started with.
    pub fn configure(&self, config: ScrapeConfig) {
        let mut shared = self.inner.lock_shared();
        shared.snapshot.source_url = config.url_display().to_string();
        shared.config = Some(config);
    }

    /// Replaces the user agent sent with downloads.
    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        self.inner.lock_shared().snapshot.user_agent = user_agent.into();
    }

    /// A detached copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock_shared().snapshot.clone()
    }

    /// Registers a callback invoked on the worker thread after every
    /// published step. Callbacks must not block.
    pub fn subscribe(&self, callback: impl Fn(&Snapshot) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(callback)));
        SubscriptionId(id)
    }

    /// Removes a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id.0);
        before != subscribers.len()
    }

    /// Requests cancellation of the active run. The worker honors it
    /// at its next checkpoint and publishes `CancelThread`.
    pub fn cancel(&self) {
        self.inner.lock_shared().cancel = true;
    }

    /// Hands the configured job to the worker.
    ///
    /// Returns false without disturbing an active run when one is
    /// still going (`BusyFailed`), when no configuration was installed
    /// (`StartFailed`), when a remote source has no accepted URL
    /// (`InvalidWebSiteGiven`), or when a rule-based job has no rules
    /// (`NoRegexListGiven`).
    pub fn start(&self) -> bool {
        let inner = &self.inner;
        let (accepted, pending) = {
            let mut shared = inner.lock_shared();
            if shared.running {
                // publish the refusal without touching the live run
                let mut refused = shared.snapshot.clone();
                refused.last_error_code = ErrorCode::BusyFailed;
                (false, vec![refused])
            } else {
                let mut pending = Vec::new();
                shared.snapshot.last_error_code = ErrorCode::Starting;
                shared.snapshot.progress_percent = 0;
                shared.snapshot.download_percent = 0;
                shared.snapshot.last_failure = None;
                pending.push(shared.snapshot.clone());

                match refuse_reason(shared.config.as_ref()) {
                    Some(code) => {
                        shared.snapshot.last_error_code = code;
                        shared.cancel = false;
                        pending.push(shared.snapshot.clone());
                        (false, pending)
                    }
                    None => {
                        shared.snapshot.fact_results.clear();
                        shared.snapshot.bar_results.clear();
                        shared.snapshot.last_rule_name = None;
                        shared.cancel = false;
                        shared.running = true;
                        (true, pending)
                    }
                }
            }
        };
        for snapshot in &pending {
            inner.notify(snapshot);
        }
        accepted
    }
}

impl Default for Scraper {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scraper {
    fn drop(&mut self) {
        {
            let mut shared = self.inner.lock_shared();
            shared.shutdown = true;
            shared.cancel = true;
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Why a `start()` must be refused, if it must.
fn refuse_reason(config: Option<&ScrapeConfig>) -> Option<ErrorCode> {
    let Some(config) = config else {
        return Some(ErrorCode::StartFailed);
    };
    if config.source() == SourceKind::RemoteUrl && config.url().is_none() {
        return Some(ErrorCode::InvalidWebSiteGiven);
    }
    if config.strategy() == Strategy::RuleBased
        && config.rule_set().map_or(true, |rules| rules.is_empty())
    {
        return Some(ErrorCode::NoRegexListGiven);
    }
    None
}

impl Inner {
    fn lock_shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mutates the live snapshot and publishes the result. A terminal
    /// code also returns the controller to idle and clears the
    /// cancellation flag.
    fn publish<F: FnOnce(&mut Snapshot)>(&self, mutate: F) {
        let snapshot = {
            let mut shared = self.lock_shared();
            mutate(&mut shared.snapshot);
            if shared.snapshot.last_error_code.is_terminal() {
                shared.snapshot.state = ScraperState::Idle;
                shared.cancel = false;
                shared.running = false;
            }
            shared.snapshot.clone()
        };
        self.notify(&snapshot);
    }

    /// Mutates the live snapshot without publishing.
    fn update<F: FnOnce(&mut Snapshot)>(&self, mutate: F) {
        mutate(&mut self.lock_shared().snapshot);
    }

    fn notify(&self, snapshot: &Snapshot) {
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }

    /// Fails with [`ExtractError::Cancelled`] once `cancel()` was called.
    fn checkpoint(&self) -> Result<(), ExtractError> {
        if self.lock_shared().cancel {
            Err(ExtractError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        let pending = {
            let shared = inner.lock_shared();
            if shared.shutdown {
                return;
            }
            shared.running
        };
        if pending {
            run_once(&inner);
        }
        thread::sleep(IDLE_POLL);
    }
}

/// Drives one accepted run to its terminal snapshot.
fn run_once(inner: &Inner) {
    let config = inner.lock_shared().config.clone();
    let Some(config) = config else {
        inner.publish(|s| s.last_error_code = ErrorCode::StartFailed);
        return;
    };
    if let Err(err) = execute(inner, &config) {
        let code = err.code();
        warn!(code = code.as_i32(), error = %err, "extraction run failed");
        let failure = err.is_exceptional().then(|| Arc::new(err));
        inner.publish(|s| {
            s.last_error_code = code;
            s.progress_percent = 0;
            s.last_failure = failure;
        });
    }
}

fn execute(inner: &Inner, config: &ScrapeConfig) -> Result<(), ExtractError> {
    inner.publish(|s| {
        s.state = ScraperState::Started;
        s.last_error_code = ErrorCode::Started;
        s.progress_percent = 0;
        s.download_percent = 0;
        s.http_status = None;
        s.last_rule_name = None;
        s.last_failure = None;
    });
    inner.checkpoint()?;

    let text = match config.source() {
        SourceKind::RemoteUrl => load_content(inner, config)?,
        SourceKind::InlineText => config.text().unwrap_or_default().to_string(),
    };
    inner.checkpoint()?;

    match config.strategy() {
        Strategy::RuleBased => run_rules(inner, config, &text),
        Strategy::ProviderRealtime(provider) => run_realtime(inner, provider, &text),
        Strategy::ProviderHistory(provider) => run_history(inner, provider, &text),
    }
}

/// Download phase. Publishes at 5% and 10%; byte-level download
/// progress only updates the snapshot field silently.
fn load_content(inner: &Inner, config: &ScrapeConfig) -> Result<String, ExtractError> {
    inner.publish(|s| {
        s.state = ScraperState::Loading;
        s.last_error_code = ErrorCode::ContentLoadStarted;
        s.progress_percent = LOAD_STARTED_PERCENT;
    });

    let url = config
        .url()
        .cloned()
        .ok_or_else(|| ExtractError::Internal("remote source without an accepted url".to_string()))?;
    let request = FetchRequest {
        url,
        user_agent: inner.lock_shared().snapshot.user_agent.clone(),
        api_key: config.api_key().map(str::to_string),
    };

    let mut on_progress = |percent: u8| {
        inner.update(|s| s.download_percent = percent);
    };
    let is_cancelled = || inner.lock_shared().cancel;
    let content = inner.loader.fetch(&request, &mut on_progress, &is_cancelled)?;

    let text = String::from_utf8_lossy(&content.bytes).into_owned();
    debug!(
        len = content.bytes.len(),
        encoding = config.encoding(),
        "content loaded"
    );
    if text.is_empty() {
        inner.update(|s| {
            s.raw_content_bytes = content.bytes;
            s.raw_content_text.clear();
            s.http_status = content.http_status;
        });
        return Err(ExtractError::NoContent);
    }

    let body = text.clone();
    inner.publish(move |s| {
        s.raw_content_bytes = content.bytes;
        s.raw_content_text = body;
        s.http_status = content.http_status;
        s.last_error_code = ErrorCode::ContentLoadFinished;
        s.progress_percent = LOAD_FINISHED_PERCENT;
    });
    Ok(text)
}

/// Applies every configured rule in order, spreading progress evenly
/// over the 15..100 range.
fn run_rules(inner: &Inner, config: &ScrapeConfig, text: &str) -> Result<(), ExtractError> {
    let rules = config.rule_set().cloned().unwrap_or_default();
    if rules.is_empty() {
        // the configuration was swapped out between start() and pickup
        return Err(ExtractError::Internal("no rules configured".to_string()));
    }
    inner.publish(|s| {
        s.state = ScraperState::Parsing;
        s.last_error_code = ErrorCode::SearchStarted;
        s.progress_percent = SEARCH_BASE_PERCENT;
    });

    let step = (100 - SEARCH_BASE_PERCENT as u32) / rules.len() as u32;
    let mut percent = SEARCH_BASE_PERCENT as u32;
    for (name, rule) in rules.iter() {
        inner.checkpoint()?;
        inner.update(|s| s.last_rule_name = Some(name.clone()));

        let values = engine::apply_rule(text, rule)?;
        if values.is_empty() {
            if !rule.allow_empty {
                return Err(ExtractError::ParsingFailed(format!(
                    "rule '{name}' extracted nothing"
                )));
            }
            debug!(rule = %name, "rule extracted nothing, skipping");
        } else {
            let name = name.clone();
            inner.update(move |s| {
                s.fact_results.insert(name, values);
            });
        }

        percent += step;
        if percent < 100 {
            inner.publish(|s| {
                s.last_error_code = ErrorCode::SearchRunning;
                s.progress_percent = percent as u8;
            });
        }
    }

    finish(inner, true)
}

/// Dispatches the realtime payload and publishes one step per fact.
fn run_realtime(inner: &Inner, provider: ProviderId, text: &str) -> Result<(), ExtractError> {
    if text.is_empty() {
        return Err(ExtractError::NoContent);
    }
    inner.publish(|s| {
        s.state = ScraperState::Parsing;
        s.last_error_code = ErrorCode::SearchStarted;
        s.progress_percent = SEARCH_BASE_PERCENT;
    });

    let facts: Vec<Fact> = match provider {
        ProviderId::OnVista => onvista::realtime_facts(text)?,
        ProviderId::Yahoo => yahoo::realtime_facts(text)?,
    };

    let step = (100 - SEARCH_BASE_PERCENT as u32) / facts.len() as u32;
    let mut percent = SEARCH_BASE_PERCENT as u32;
    for (name, value) in facts {
        inner.checkpoint()?;
        inner.update(move |s| {
            s.fact_results.insert(name.to_string(), vec![value]);
        });
        percent += step;
        if percent < 100 {
            inner.publish(|s| {
                s.last_error_code = ErrorCode::SearchRunning;
                s.progress_percent = percent as u8;
            });
        }
        thread::sleep(CANCEL_WINDOW);
    }

    inner.checkpoint()?;
    inner.publish(|s| {
        s.last_error_code = ErrorCode::Finished;
        s.progress_percent = 100;
    });
    Ok(())
}

/// Dispatches the history payload and advances progress per row, from
/// wherever the load phase left it up to 100.
fn run_history(inner: &Inner, provider: ProviderId, text: &str) -> Result<(), ExtractError> {
    if text.is_empty() {
        return Err(ExtractError::NoContent);
    }
    inner.publish(|s| {
        s.state = ScraperState::Parsing;
        s.last_error_code = ErrorCode::SearchStarted;
    });

    let rows = match provider {
        ProviderId::OnVista => onvista::history_bars(text)?,
        ProviderId::Yahoo => yahoo::history_bars(text)?,
    };

    let base = inner.lock_shared().snapshot.progress_percent;
    let step = (100.0 - base as f64) / rows.len() as f64;
    let mut percent = base as f64;
    for row in rows {
        inner.checkpoint()?;
        if let Some(bar) = row {
            inner.update(move |s| {
                s.bar_results.insert(bar);
            });
        }
        percent += step;
        if percent < 100.0 {
            inner.publish(|s| {
                s.last_error_code = ErrorCode::SearchRunning;
                s.progress_percent = percent as u8;
            });
        }
    }

    finish(inner, true)
}

/// Publishes the closing `SearchFinished`/`Finished` pair, with a
/// cancellation window before each.
fn finish(inner: &Inner, with_search_finished: bool) -> Result<(), ExtractError> {
    if with_search_finished {
        thread::sleep(CANCEL_WINDOW);
        inner.checkpoint()?;
        inner.publish(|s| {
            s.last_error_code = ErrorCode::SearchFinished;
            s.progress_percent = 100;
        });
    }
    thread::sleep(CANCEL_WINDOW);
    inner.checkpoint()?;
    inner.publish(|s| {
        s.last_error_code = ErrorCode::Finished;
        s.progress_percent = 100;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::loader::{LoadError, LoadedContent};
    use crate::models::{Rule, RuleSet};
    use rust_decimal_macros::dec;

    /// Serves a canned body after an optional delay.
    struct CannedLoader {
        body: Vec<u8>,
        status: u16,
        delay: Duration,
    }

    impl CannedLoader {
        fn new(body: &str) -> Self {
            Self {
                body: body.as_bytes().to_vec(),
                status: 200,
                delay: Duration::ZERO,
            }
        }

        fn with_delay(body: &str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(body)
            }
        }
    }

    impl ContentLoader for CannedLoader {
        fn fetch(
            &self,
            _request: &FetchRequest,
            progress: &mut dyn FnMut(u8),
            cancelled: &dyn Fn() -> bool,
        ) -> Result<LoadedContent, LoadError> {
            let deadline = Instant::now() + self.delay;
            while Instant::now() < deadline {
                if cancelled() {
                    return Err(LoadError::Cancelled);
                }
                thread::sleep(Duration::from_millis(5));
            }
            progress(100);
            Ok(LoadedContent {
                bytes: self.body.clone(),
                http_status: Some(self.status),
            })
        }
    }

    /// Always fails with an I/O error.
    struct BrokenLoader;

    impl ContentLoader for BrokenLoader {
        fn fetch(
            &self,
            _request: &FetchRequest,
            _progress: &mut dyn FnMut(u8),
            _cancelled: &dyn Fn() -> bool,
        ) -> Result<LoadedContent, LoadError> {
            Err(LoadError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            )))
        }
    }

    fn record_events(scraper: &Scraper) -> Arc<Mutex<Vec<Snapshot>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        scraper.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.clone());
        });
        events
    }

    /// Waits until a terminal code shows up in the event stream.
    /// `BusyFailed` is the refusal of a second `start()`, not the end
    /// of the live run, so it is skipped.
    fn wait_terminal(events: &Arc<Mutex<Vec<Snapshot>>>) -> Snapshot {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            {
                let events = events.lock().unwrap();
                if let Some(snapshot) = events.iter().find(|s| {
                    s.last_error_code.is_terminal()
                        && s.last_error_code != ErrorCode::BusyFailed
                }) {
                    return snapshot.clone();
                }
            }
            assert!(Instant::now() < deadline, "no terminal snapshot published");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn price_rules() -> RuleSet {
        let mut rules = RuleSet::new();
        rules.add("Total", Rule::new(r"total=(\d+)", 0, false));
        rules.add("Items", Rule::new(r"item=(\d+)", -1, false));
        rules
    }

    #[test]
    fn test_inline_rule_run_finishes_with_results() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::inline_text(
            "item=1 item=2 total=42",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::Finished);
        assert_eq!(terminal.state, ScraperState::Idle);
        assert_eq!(terminal.progress_percent, 100);
        assert_eq!(terminal.fact_results["Total"], vec!["42".to_string()]);
        assert_eq!(
            terminal.fact_results["Items"],
            vec!["1".to_string(), "2".to_string()]
        );
        assert_eq!(terminal.last_rule_name.as_deref(), Some("Items"));
    }

    #[test]
    fn test_published_progress_never_decreases() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("total=1 item=2")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::remote_text(
            "https://example.com/data",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());
        wait_terminal(&events);

        let events = events.lock().unwrap();
        let codes: Vec<ErrorCode> = events.iter().map(|s| s.last_error_code).collect();
        assert!(codes.contains(&ErrorCode::Starting));
        assert!(codes.contains(&ErrorCode::Started));
        assert!(codes.contains(&ErrorCode::ContentLoadStarted));
        assert!(codes.contains(&ErrorCode::ContentLoadFinished));
        assert!(codes.contains(&ErrorCode::SearchStarted));
        assert!(codes.contains(&ErrorCode::SearchFinished));
        assert_eq!(codes.last(), Some(&ErrorCode::Finished));

        let progress: Vec<u8> = events.iter().map(|s| s.progress_percent).collect();
        assert!(
            progress.windows(2).all(|pair| pair[0] <= pair[1]),
            "progress went backwards: {progress:?}"
        );
    }

    #[test]
    fn test_missing_required_rule_fails_the_run() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::inline_text(
            "item=1 item=2",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::ParsingFailed);
        assert_eq!(terminal.state, ScraperState::Idle);
        assert_eq!(terminal.progress_percent, 0);
        assert!(!terminal.fact_results.contains_key("Total"));
        assert!(terminal.last_failure.is_none());
    }

    #[test]
    fn test_optional_rule_without_match_is_skipped() {
        let mut rules = RuleSet::new();
        rules.add("Total", Rule::new(r"total=(\d+)", 0, false));
        rules.add("Missing", Rule::new(r"absent=(\d+)", 0, true));

        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::inline_text("total=9", "utf-8", rules));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::Finished);
        assert_eq!(terminal.fact_results["Total"], vec!["9".to_string()]);
        assert!(!terminal.fact_results.contains_key("Missing"));
    }

    #[test]
    fn test_start_refuses_invalid_url() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("ignored")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::remote_text("not a url", "utf-8", price_rules()));
        assert!(!scraper.start());

        let snapshot = scraper.snapshot();
        assert_eq!(snapshot.last_error_code, ErrorCode::InvalidWebSiteGiven);
        assert_eq!(snapshot.source_url, "invalid");
        assert_eq!(snapshot.state, ScraperState::Idle);
        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|s| s.last_error_code == ErrorCode::Starting));
    }

    #[test]
    fn test_start_refuses_empty_rule_set() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("ignored")));
        scraper.configure(ScrapeConfig::remote_text(
            "https://example.com/data",
            "utf-8",
            RuleSet::new(),
        ));
        assert!(!scraper.start());
        assert_eq!(
            scraper.snapshot().last_error_code,
            ErrorCode::NoRegexListGiven
        );
    }

    #[test]
    fn test_start_refuses_unconfigured_controller() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("ignored")));
        assert!(!scraper.start());
        assert_eq!(scraper.snapshot().last_error_code, ErrorCode::StartFailed);
    }

    #[test]
    fn test_start_while_busy_leaves_run_untouched() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::with_delay(
            "total=5 item=6",
            Duration::from_millis(300),
        )));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::remote_text(
            "https://example.com/data",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());
        thread::sleep(Duration::from_millis(100));
        assert!(!scraper.start());

        // the live run's own snapshot never shows the refusal code
        let live = scraper.snapshot();
        assert_ne!(live.last_error_code, ErrorCode::BusyFailed);
        assert!(!live.last_error_code.is_terminal());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::Finished);
        assert_eq!(terminal.fact_results["Total"], vec!["5".to_string()]);

        let events = events.lock().unwrap();
        assert!(events
            .iter()
            .any(|s| s.last_error_code == ErrorCode::BusyFailed));
    }

    #[test]
    fn test_cancel_during_download() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::with_delay(
            "never seen",
            Duration::from_secs(2),
        )));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::remote_text(
            "https://example.com/data",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());
        thread::sleep(Duration::from_millis(60));
        scraper.cancel();

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::CancelThread);
        assert_eq!(terminal.state, ScraperState::Idle);
        assert_eq!(terminal.progress_percent, 0);
        assert!(terminal.last_failure.is_none());

        // the controller accepts a fresh run afterwards
        assert!(!scraper.snapshot().fact_results.contains_key("Total"));
    }

    #[test]
    fn test_empty_body_is_no_web_content() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::remote_text(
            "https://example.com/data",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::NoWebContentLoaded);
        assert_eq!(terminal.http_status, Some(200));
    }

    #[test]
    fn test_loader_failure_is_published_with_cause() {
        let scraper = Scraper::with_loader(Box::new(BrokenLoader));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::remote_text(
            "https://example.com/data",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::FileExceptionOccurred);
        let failure = terminal.last_failure.expect("cause retained");
        assert!(matches!(*failure, ExtractError::Io(_)));
    }

    #[test]
    fn test_yahoo_realtime_run_publishes_five_facts() {
        let body = r#"{
            "quoteResponse": {
                "result": [{
                    "currency": "EUR",
                    "regularMarketTime": 1709314502,
                    "regularMarketPrice": 181.375,
                    "regularMarketPreviousClose": 180.0
                }]
            }
        }"#;
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new(body)));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::provider(
            "https://query1.finance.yahoo.com/v7/finance/quote?symbols=SAP.DE",
            None,
            "utf-8",
            Strategy::ProviderRealtime(ProviderId::Yahoo),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::Finished);
        let names: Vec<&String> = terminal.fact_results.keys().collect();
        assert_eq!(
            names,
            ["Currency", "LastDate", "LastTime", "Price", "PriceBefore"]
        );
        assert_eq!(terminal.fact_results["Price"], vec!["181.375".to_string()]);

        // realtime runs close without a SearchFinished step
        let events = events.lock().unwrap();
        assert!(!events
            .iter()
            .any(|s| s.last_error_code == ErrorCode::SearchFinished));
    }

    #[test]
    fn test_onvista_history_run_collects_sorted_bars() {
        let body = r#"{
            "datetimeLast": [1709510400, 1709251200],
            "first": [10.3, 10.1],
            "last": [10.75, 10.25],
            "high": [10.8, 10.5],
            "low": [10.2, 9.9],
            "volume": [98000, 120000]
        }"#;
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new(body)));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::provider(
            "https://api.onvista.de/api/v1/instruments/history",
            Some("key"),
            "utf-8",
            Strategy::ProviderHistory(ProviderId::OnVista),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::Finished);
        assert_eq!(terminal.bar_results.len(), 2);
        // bars come out date-sorted regardless of payload order
        assert_eq!(terminal.bar_results.first().unwrap().close, dec!(10.25));
        assert_eq!(terminal.bar_results.last().unwrap().close, dec!(10.75));
    }

    #[test]
    fn test_yahoo_history_run_skips_null_rows() {
        // 2024-03-01, 2024-03-04 and 2024-03-05; the middle row is null
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1709251200, 1709510400, 1709596800],
                    "indicators": {
                        "quote": [{
                            "open": [10.1, null, 10.6],
                            "close": [10.25, 10.75, 10.9],
                            "high": [10.5, 10.8, 11.0],
                            "low": [9.9, 10.2, 10.5],
                            "volume": [120000, 98000, 87000]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new(body)));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::provider(
            "https://query1.finance.yahoo.com/v8/finance/chart/SAP.DE",
            None,
            "utf-8",
            Strategy::ProviderHistory(ProviderId::Yahoo),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::Finished);
        assert_eq!(terminal.progress_percent, 100);
        // the null row is dropped but the run still covers all rows
        assert_eq!(terminal.bar_results.len(), 2);
        let dates: Vec<_> = terminal.bar_results.iter().map(|b| b.date).collect();
        assert_eq!(
            dates,
            [
                chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            ]
        );
        assert_eq!(terminal.bar_results.last().unwrap().close, dec!(10.9));
    }

    #[test]
    fn test_malformed_provider_payload_is_json_failure() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("{ not json")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::provider(
            "https://query1.finance.yahoo.com/v7/finance/quote?symbols=X",
            None,
            "utf-8",
            Strategy::ProviderRealtime(ProviderId::Yahoo),
        ));
        assert!(scraper.start());

        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::JsonExceptionOccurred);
        assert!(terminal.last_failure.is_some());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("")));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = scraper.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.last_error_code);
        });
        assert!(scraper.unsubscribe(id));
        assert!(!scraper.unsubscribe(id));

        scraper.configure(ScrapeConfig::inline_text("total=1", "utf-8", price_rules()));
        scraper.start();
        thread::sleep(Duration::from_millis(150));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_controller_is_reusable_after_a_run() {
        let scraper = Scraper::with_loader(Box::new(CannedLoader::new("")));
        let events = record_events(&scraper);
        scraper.configure(ScrapeConfig::inline_text(
            "item=3 total=7",
            "utf-8",
            price_rules(),
        ));
        assert!(scraper.start());
        wait_terminal(&events);

        events.lock().unwrap().clear();
        assert!(scraper.start());
        let terminal = wait_terminal(&events);
        assert_eq!(terminal.last_error_code, ErrorCode::Finished);
        assert_eq!(terminal.fact_results["Total"], vec!["7".to_string()]);
    }
}
