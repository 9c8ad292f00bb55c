// src/source/mod.rs
//! Source discovery: ask the search capability for an article URL, keep it
//! only if it is well-formed, unused, and not from a low-value domain.

pub mod ledger;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::ai::ArticleSearch;

/// Generic encyclopedia / video hosts that make poor sources for a post.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "wikipedia.org",
    "wikimedia.org",
    "britannica.com",
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "tiktok.com",
];

/// A located, validated source article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleReference {
    url: String,
}

impl ArticleReference {
    /// Shape check only: no used-set or denylist filtering.
    pub fn parse(raw: &str) -> Result<Self, Rejection> {
        validate_candidate(clean_candidate(raw), &HashSet::new(), &[])
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_string(self) -> String {
        self.url
    }
}

impl fmt::Display for ArticleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Why a candidate was turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Malformed(String),
    AlreadyUsed,
    Denylisted(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed(why) => write!(f, "malformed url ({why})"),
            Rejection::AlreadyUsed => f.write_str("already used"),
            Rejection::Denylisted(host) => write!(f, "denylisted host {host}"),
        }
    }
}

/// Strip the wrapping models like to put around a bare URL.
pub fn clean_candidate(raw: &str) -> &str {
    let mut s = raw.trim();
    s = s.trim_matches(|c| matches!(c, '<' | '>' | '"' | '\'' | '`'));
    s = s.trim_end_matches('.');
    s.trim()
}

/// Comparison key for "same article": lower-case host, no fragment,
/// no trailing slash. Unparseable input is compared verbatim.
pub fn url_key(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// True when `host` equals a denylisted domain or is a subdomain of one.
pub fn is_denylisted(host: &str, denylist: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    denylist.iter().any(|d| {
        let d = d.trim().trim_start_matches('.').to_ascii_lowercase();
        !d.is_empty() && (host == d || host.ends_with(&format!(".{d}")))
    })
}

/// Validate one cleaned candidate against the used set and the denylist.
pub fn validate_candidate(
    candidate: &str,
    used_keys: &HashSet<String>,
    denylist: &[String],
) -> Result<ArticleReference, Rejection> {
    if candidate.is_empty() {
        return Err(Rejection::Malformed("empty".into()));
    }
    if candidate.chars().any(char::is_whitespace) {
        return Err(Rejection::Malformed("contains whitespace".into()));
    }
    let parsed =
        Url::parse(candidate).map_err(|e| Rejection::Malformed(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Rejection::Malformed(format!(
            "unsupported scheme {}",
            parsed.scheme()
        )));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| Rejection::Malformed("no host".into()))?;

    if used_keys.contains(&url_key(candidate)) {
        return Err(Rejection::AlreadyUsed);
    }
    if is_denylisted(host, denylist) {
        return Err(Rejection::Denylisted(host.to_string()));
    }
    Ok(ArticleReference {
        url: candidate.to_string(),
    })
}

/// Bounded-retry article search over an injected search capability.
pub struct SourceFinder {
    search: Arc<dyn ArticleSearch>,
    denylist: Vec<String>,
    max_attempts: u32,
}

impl SourceFinder {
    pub fn new(search: Arc<dyn ArticleSearch>, max_attempts: u32) -> Self {
        Self {
            search,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_extra_denylist<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist.extend(extra.into_iter().map(Into::into));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `None` means no acceptable candidate turned up within the attempt bound.
    pub async fn find_article(
        &self,
        topic: &str,
        used_urls: &HashSet<String>,
    ) -> Option<ArticleReference> {
        let used_keys: HashSet<String> = used_urls.iter().map(|u| url_key(u)).collect();
        // Used URLs sorted for a stable prompt; rejections are appended after them.
        let mut exclude: Vec<String> = used_urls.iter().cloned().collect();
        exclude.sort();

        for attempt in 1..=self.max_attempts {
            let raw = match self.search.find_article_url(topic, &exclude).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(topic, attempt, error = %e, "article search failed");
                    continue;
                }
            };

            let candidate = clean_candidate(&raw);
            match validate_candidate(candidate, &used_keys, &self.denylist) {
                Ok(article) => {
                    info!(topic, attempt, url = %article, "article accepted");
                    return Some(article);
                }
                Err(why) => {
                    warn!(topic, attempt, candidate, reason = %why, "article candidate rejected");
                    // Tell the next attempt not to come back with the same URL.
                    if !matches!(why, Rejection::Malformed(_)) {
                        exclude.push(candidate.to_string());
                    }
                }
            }
        }

        warn!(topic, attempts = self.max_attempts, "no acceptable article found");
        None
    }
}
