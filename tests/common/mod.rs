// tests/common/mod.rs
// Fake capabilities shared by the pipeline integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use daily_knowledge_bot::ai::{ArticleSearch, ArticleSummarizer, PostRequest, PostWriter};
use daily_knowledge_bot::artifacts::ArtifactStore;
use daily_knowledge_bot::error::{PublishError, TransportError};
use daily_knowledge_bot::illustration::{ImageGenerator, ImagePrompt};
use daily_knowledge_bot::publish::{PublishReceipt, PublishRequest, Publisher};
use daily_knowledge_bot::source::ledger::UsedSourceLedger;
use daily_knowledge_bot::{Capabilities, Pipeline, PipelineSettings};

/// Hands out the scripted URLs in order, then keeps repeating the last one.
/// Every exclusion list it was given is kept for inspection.
pub struct ScriptedSearch {
    answers: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    pub seen_excludes: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSearch {
    pub fn new(urls: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(urls.iter().map(|u| u.to_string()).collect()),
            last: Mutex::new(None),
            seen_excludes: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen_excludes.lock().unwrap().len()
    }
}

#[async_trait]
impl ArticleSearch for ScriptedSearch {
    async fn find_article_url(&self, _topic: &str, exclude: &[String]) -> Result<String, TransportError> {
        self.seen_excludes.lock().unwrap().push(exclude.to_vec());
        let next = self.answers.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(url) = next {
            *last = Some(url);
        }
        last.clone()
            .ok_or_else(|| TransportError::InvalidResponse("no scripted url".into()))
    }
}

pub struct FixedSummary(pub &'static str);

#[async_trait]
impl ArticleSummarizer for FixedSummary {
    async fn summarize_article(&self, _url: &str) -> Result<String, TransportError> {
        Ok(self.0.to_string())
    }
}

pub struct FailingSummarizer;

#[async_trait]
impl ArticleSummarizer for FailingSummarizer {
    async fn summarize_article(&self, _url: &str) -> Result<String, TransportError> {
        Err(TransportError::Status {
            status: 503,
            body: "unavailable".into(),
        })
    }
}

/// Writes a short post in the shape models usually return.
pub struct EchoWriter;

#[async_trait]
impl PostWriter for EchoWriter {
    async fn write_post(&self, req: &PostRequest) -> Result<String, TransportError> {
        Ok(format!(
            "Did you know? {}\n\n#Learning\n\nSource: {}",
            req.fact, req.source_url
        ))
    }
}

pub struct FailingWriter;

#[async_trait]
impl PostWriter for FailingWriter {
    async fn write_post(&self, _req: &PostRequest) -> Result<String, TransportError> {
        Err(TransportError::InvalidResponse("model refused".into()))
    }
}

/// Returns a real (tiny) PNG, or fails when built with `failing()`.
pub struct FakeImages {
    fail: bool,
}

impl FakeImages {
    pub fn working() -> Arc<Self> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, _prompt: &ImagePrompt) -> Result<Vec<u8>, TransportError> {
        if self.fail {
            return Err(TransportError::Status {
                status: 429,
                body: "quota exceeded".into(),
            });
        }
        let img = image::RgbImage::from_pixel(200, 100, image::Rgb([10, 20, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

/// Records every request; confirms or rejects.
pub struct RecordingPublisher {
    reject: bool,
    pub requests: Mutex<Vec<PublishRequest>>,
}

impl RecordingPublisher {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            reject: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.reject {
            return Err(PublishError::Rejected {
                status: 422,
                body: "duplicate content".into(),
            });
        }
        Ok(PublishReceipt {
            identity: request.identity,
            status: 201,
            post_id: Some("urn:li:share:42".into()),
            image_asset: None,
        })
    }
}

pub fn text_caps(search: Arc<ScriptedSearch>) -> Capabilities {
    Capabilities {
        search,
        summarizer: Arc::new(FixedSummary(
            "Octopuses have three hearts and blue blood.",
        )),
        writer: Arc::new(EchoWriter),
        images: None,
        publisher: None,
    }
}

pub fn pipeline_in(dir: &Path, topics: &[&str], caps: Capabilities) -> Pipeline {
    let settings = PipelineSettings {
        mark_file: dir.join("assets/brand_mark.png"),
        ..PipelineSettings::default()
    };
    Pipeline::new(
        caps,
        topics.iter().map(|t| t.to_string()).collect(),
        ArtifactStore::new(dir.join("output")),
        UsedSourceLedger::new(dir.join("output/used_sources.json")),
        settings,
    )
}

pub fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

pub fn files_under(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
