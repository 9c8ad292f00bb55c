// src/ai/perplexity.rs
//! Perplexity chat-completions client. One HTTP client backs all three text
//! capabilities; each call differs only in model, prompt, and sampling.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ArticleSearch, ArticleSummarizer, PostRequest, PostWriter};
use crate::compose::Tone;
use crate::error::TransportError;

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// How many used URLs are quoted back to the search model at most.
const MAX_EXCLUDED_IN_PROMPT: usize = 50;

#[derive(Debug, Clone)]
pub struct PerplexitySettings {
    pub api_key: String,
    pub base_url: String,
    /// Model for search + summarization.
    pub research_model: String,
    /// Model for post drafting.
    pub writer_model: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl PerplexitySettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            research_model: "sonar-pro".to_string(),
            writer_model: "sonar".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct PerplexityClient {
    http: reqwest::Client,
    settings: PerplexitySettings,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

impl PerplexityClient {
    pub fn new(settings: PerplexitySettings) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("daily-knowledge-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, TransportError> {
        let req = Req {
            model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
        };

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), body));
        }

        let body: Resp = resp.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TransportError::InvalidResponse("no choices in completion".into()))?;
        debug!(model, chars = content.len(), "completion received");
        Ok(content)
    }
}

#[async_trait]
impl ArticleSearch for PerplexityClient {
    async fn find_article_url(
        &self,
        topic: &str,
        exclude: &[String],
    ) -> Result<String, TransportError> {
        let system = "You are a search assistant. Your sole purpose is to find a single, highly relevant, and verifiable online article for the given topic. Respond with ONLY the URL and nothing else.";
        let user = search_prompt(topic, exclude);
        let out = self
            .chat(&self.settings.research_model, system, &user, 150, 0.2)
            .await?;
        Ok(out.trim().to_string())
    }
}

#[async_trait]
impl ArticleSummarizer for PerplexityClient {
    async fn summarize_article(&self, article_url: &str) -> Result<String, TransportError> {
        let system = "You are a summarization assistant. Read the content of the provided URL and provide a concise, interesting summary of the key finding or main point. The summary should be under 100 words.";
        let user = format!("Please summarize this article: {article_url}");
        let out = self
            .chat(&self.settings.research_model, system, &user, 200, 0.7)
            .await?;
        Ok(out.trim().to_string())
    }
}

#[async_trait]
impl PostWriter for PerplexityClient {
    async fn write_post(&self, request: &PostRequest) -> Result<String, TransportError> {
        let system = writer_system_prompt(request.tone, request.max_words);
        let user = format!(
            "Topic: {}\nFact to summarize: {}\nSource to use: {}",
            request.topic, request.fact, request.source_url
        );
        self.chat(&self.settings.writer_model, &system, &user, 400, 0.7)
            .await
    }
}

fn search_prompt(topic: &str, exclude: &[String]) -> String {
    let mut out = format!("Find one interesting article about {topic}.");
    if !exclude.is_empty() {
        out.push_str("\nDo NOT return any of these previously used URLs:");
        // Keep the tail: candidates rejected during this search come last.
        let skip = exclude.len().saturating_sub(MAX_EXCLUDED_IN_PROMPT);
        for url in exclude.iter().skip(skip) {
            out.push_str("\n- ");
            out.push_str(url);
        }
    }
    out
}

fn writer_system_prompt(tone: Tone, max_words: usize) -> String {
    // Leave room for the citation and hashtags appended afterwards.
    let body_words = max_words.saturating_sub(30).max(40);
    match tone {
        Tone::Standard => format!(
            "You are a social media expert specializing in LinkedIn content. Your tone is professional, engaging, and insightful. \
             Convert the user's fact into a compelling LinkedIn post under {body_words} words.\n\n\
             Formatting Rules:\n\
             - Use paragraphs for readability. Separate them with a blank line.\n\
             - Start with a strong hook.\n\
             - Explain the fact clearly.\n\
             - End with a thought-provoking question or statement.\n\
             - Include 3-5 relevant hashtags.\n\
             - At the very end, under a 'Source:' heading, list ONLY the single source URL provided. Do not add any new sources or citations."
        ),
        Tone::Conversational => format!(
            "You are a friendly writer sharing something you just learned with your professional network. \
             Write like a person talking, not like a press release. Keep it under {body_words} words.\n\n\
             Formatting Rules:\n\
             - Plain text only. No markdown, no bold, no italics, no headings.\n\
             - No footnote markers such as [1] or [X].\n\
             - Short paragraphs separated by a blank line.\n\
             - End with a question that invites replies.\n\
             - Include 3-5 relevant hashtags.\n\
             - At the very end write 'Source:' followed by ONLY the single source URL provided."
        ),
    }
}
