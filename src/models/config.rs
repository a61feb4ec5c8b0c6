use lazy_static::lazy_static;
use regex::Regex;
use url::{Host, Url};

use crate::models::rules::RuleSet;

lazy_static! {
    // Conservative shape check on top of the structural parse.
    static ref URL_SHAPE: Regex =
        Regex::new(r"(http|https)://([\w-]+\.)+[\w-]+(/[\w ./?%&=-]*)?").unwrap();
}

/// Where the text to extract from comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Caller-supplied text, no download phase.
    InlineText,
    /// Content is fetched from the configured URL.
    RemoteUrl,
}

/// The supported data providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderId {
    OnVista,
    Yahoo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OnVista => "ONVISTA",
            ProviderId::Yahoo => "YAHOO",
        }
    }
}

/// How loaded content is turned into results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Apply the configured rule set against the text.
    RuleBased,
    /// Normalize a provider realtime payload into named facts.
    ProviderRealtime(ProviderId),
    /// Normalize a provider history payload into daily bars.
    ProviderHistory(ProviderId),
}

/// A complete description of one extraction job.
///
/// The URL is validated on construction. A rejected URL is kept as the
/// originally supplied string for display while [`url`](Self::url)
/// stays `None`, which makes the next `start()` fail with
/// `InvalidWebSiteGiven`.
#[derive(Clone, Debug)]
pub struct ScrapeConfig {
    source: SourceKind,
    strategy: Strategy,
    url: Option<Url>,
    given_url: Option<String>,
    api_key: Option<String>,
    inline_text: Option<String>,
    encoding: String,
    rule_set: Option<RuleSet>,
}

impl ScrapeConfig {
    /// Rule-based extraction over caller-supplied text.
    pub fn inline_text(
        text: impl Into<String>,
        encoding: impl Into<String>,
        rule_set: RuleSet,
    ) -> Self {
        Self {
            source: SourceKind::InlineText,
            strategy: Strategy::RuleBased,
            url: None,
            given_url: None,
            api_key: None,
            inline_text: Some(text.into()),
            encoding: encoding.into(),
            rule_set: Some(rule_set),
        }
    }

    /// Rule-based extraction over content fetched from `url`.
    pub fn remote_text(url: &str, encoding: impl Into<String>, rule_set: RuleSet) -> Self {
        Self {
            source: SourceKind::RemoteUrl,
            strategy: Strategy::RuleBased,
            url: validate_url(url),
            given_url: Some(url.to_string()),
            api_key: None,
            inline_text: None,
            encoding: encoding.into(),
            rule_set: Some(rule_set),
        }
    }

    /// Provider normalization of a payload fetched from `url`.
    pub fn provider(
        url: &str,
        api_key: Option<&str>,
        encoding: impl Into<String>,
        strategy: Strategy,
    ) -> Self {
        Self {
            source: SourceKind::RemoteUrl,
            strategy,
            url: validate_url(url),
            given_url: Some(url.to_string()),
            api_key: api_key.map(str::to_string),
            inline_text: None,
            encoding: encoding.into(),
            rule_set: None,
        }
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The validated URL, if one was accepted.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// The URL string as originally supplied, valid or not.
    pub fn given_url(&self) -> Option<&str> {
        self.given_url.as_deref()
    }

    /// What snapshots show as the source: the accepted URL, the marker
    /// `"invalid"` for a rejected one, or empty for inline text.
    pub fn url_display(&self) -> &str {
        match (&self.url, &self.given_url) {
            (Some(url), _) => url.as_str(),
            (None, Some(_)) => "invalid",
            (None, None) => "",
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.inline_text.as_deref()
    }

    /// Label of the encoding the source claims, kept for diagnostics.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn rule_set(&self) -> Option<&RuleSet> {
        self.rule_set.as_ref()
    }
}

/// Accepts only absolute `http`/`https` URLs with a resolvable-looking
/// host that also pass the conservative shape pattern.
fn validate_url(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    match parsed.host() {
        Some(Host::Domain(_)) | Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {}
        None => return None,
    }
    if !URL_SHAPE.is_match(raw) {
        return None;
    }
    Some(parsed)
}
