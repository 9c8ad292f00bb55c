// src/ai/mod.rs
//! Text capabilities the pipeline depends on: search, summarize, write a post.
//!
//! Each is a narrow trait so the orchestrator can be driven by a real
//! provider or by fakes in tests. `perplexity` holds the production client.

pub mod perplexity;

use async_trait::async_trait;

use crate::compose::Tone;
use crate::error::TransportError;

/// Finds one candidate article URL for a topic.
#[async_trait]
pub trait ArticleSearch: Send + Sync {
    /// `exclude` is passed along as context; providers are not guaranteed to honor it.
    async fn find_article_url(
        &self,
        topic: &str,
        exclude: &[String],
    ) -> Result<String, TransportError>;
}

/// Condenses the article behind a URL into a short summary.
#[async_trait]
pub trait ArticleSummarizer: Send + Sync {
    async fn summarize_article(&self, article_url: &str) -> Result<String, TransportError>;
}

/// Everything the post writer needs to draft one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRequest {
    pub topic: String,
    pub fact: String,
    pub source_url: String,
    pub tone: Tone,
    pub max_words: usize,
}

/// Turns a fact into platform-ready post text.
#[async_trait]
pub trait PostWriter: Send + Sync {
    async fn write_post(&self, request: &PostRequest) -> Result<String, TransportError>;
}
