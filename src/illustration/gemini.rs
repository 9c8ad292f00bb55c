// src/illustration/gemini.rs
//! Gemini `generateContent` client returning one inline image.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ImageGenerator, ImagePrompt};
use crate::error::TransportError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl GeminiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub struct GeminiImageClient {
    http: reqwest::Client,
    settings: GeminiSettings,
}

#[derive(Serialize)]
struct Req<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
    #[serde(rename = "candidateCount")]
    candidate_count: u8,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    #[serde(rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

impl GeminiImageClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("daily-knowledge-bot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }
}

/// Gemini has no negative-prompt field; constraints ride along in the text.
fn prompt_text(prompt: &ImagePrompt) -> String {
    match &prompt.negative {
        Some(neg) if !neg.trim().is_empty() => format!("{}\nAvoid: {}.", prompt.prompt, neg.trim()),
        _ => prompt.prompt.clone(),
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate_image(&self, prompt: &ImagePrompt) -> Result<Vec<u8>, TransportError> {
        let text = prompt_text(prompt);
        let req = Req {
            contents: vec![Content {
                parts: vec![TextPart { text: &text }],
            }],
            generation_config: GenConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
                candidate_count: 1,
            },
        };

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), body));
        }

        let body: Resp = resp.json().await?;
        let data = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
            .map(|d| d.data)
            .ok_or_else(|| TransportError::InvalidResponse("no image data in response".into()))?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| TransportError::InvalidResponse(format!("bad base64 image: {e}")))?;
        debug!(bytes = bytes.len(), "image received");
        Ok(bytes)
    }
}
