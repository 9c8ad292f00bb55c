// src/summarize.rs
//! Summarizer: one article URL in, one short fact out.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::info;

use crate::ai::ArticleSummarizer;
use crate::error::TransportError;

/// Short text derived from one article. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact(String);

impl Fact {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl From<String> for Fact {
    fn from(s: String) -> Self {
        Fact(s)
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Summarizer {
    backend: Arc<dyn ArticleSummarizer>,
    max_words: usize,
}

impl Summarizer {
    pub fn new(backend: Arc<dyn ArticleSummarizer>, max_words: usize) -> Self {
        Self {
            backend,
            max_words: max_words.max(1),
        }
    }

    /// Failures propagate unchanged; there is no fallback summary.
    pub async fn summarize(&self, article_url: &str) -> Result<Fact, TransportError> {
        let raw = self.backend.summarize_article(article_url).await?;
        let text = clean_summary(&raw, self.max_words);
        if text.is_empty() {
            return Err(TransportError::InvalidResponse(
                "summary is empty".to_string(),
            ));
        }
        let fact = Fact(text);
        info!(url = article_url, words = fact.word_count(), "article summarized");
        Ok(fact)
    }
}

/// Decode entities, drop `[n]` reference markers, collapse whitespace,
/// cap at `max_words`.
pub fn clean_summary(raw: &str, max_words: usize) -> String {
    static RE_REFS: OnceCell<Regex> = OnceCell::new();
    let re_refs = RE_REFS.get_or_init(|| Regex::new(r"\s*(?:\[\d+\])+").unwrap());

    let decoded = html_escape::decode_html_entities(raw);
    let no_refs = re_refs.replace_all(&decoded, "");
    let words: Vec<&str> = no_refs.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    let mut out = words[..max_words].join(" ");
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(Result<&'static str, ()>);

    #[async_trait]
    impl ArticleSummarizer for Fixed {
        async fn summarize_article(&self, _url: &str) -> Result<String, TransportError> {
            self.0
                .map(str::to_string)
                .map_err(|_| TransportError::InvalidResponse("boom".into()))
        }
    }

    #[test]
    fn references_and_entities_are_removed() {
        let out = clean_summary("Bees  can count&nbsp;to four [1][2].\nResearchers agree [3].", 100);
        assert_eq!(out, "Bees can count to four. Researchers agree.");
    }

    #[test]
    fn long_summaries_are_capped() {
        let raw = (0..150).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let out = clean_summary(&raw, 100);
        assert_eq!(out.split_whitespace().count(), 100);
        assert!(out.ends_with("w99…"));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let s = Summarizer::new(Arc::new(Fixed(Err(()))), 100);
        assert!(s.summarize("https://e.com").await.is_err());
    }

    #[tokio::test]
    async fn blank_summary_is_invalid() {
        let s = Summarizer::new(Arc::new(Fixed(Ok("   [1] "))), 100);
        let err = s.summarize("https://e.com").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
    }
}
