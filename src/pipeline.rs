// src/pipeline.rs
//! # Daily pipeline
//! `SelectTopic → FindSource → Summarize → Compose → (GenerateImage) →
//! (ApplyMark) → AwaitDecision → (Publish) → (RecordSource)`.
//!
//! `run` stops at the decision point with drafts on disk; `publish` takes the
//! bundle through the gate. The ledger is written only after the platform has
//! confirmed a post.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use tracing::{info, info_span, warn, Instrument, Span};

use crate::ai::{ArticleSearch, ArticleSummarizer, PostWriter};
use crate::artifacts::ArtifactStore;
use crate::compose::{PostComposer, PostDraft, Tone};
use crate::config::BotConfig;
use crate::confirm::PublishGate;
use crate::error::{BotError, PublishError};
use crate::illustration::watermark::{mark_artifact, MarkOutcome};
use crate::illustration::{ImageArtifact, ImageGenerator, ImageProducer};
use crate::publish::{Identity, PublishReceipt, PublishRequest, Publisher};
use crate::source::ledger::UsedSourceLedger;
use crate::source::{ArticleReference, SourceFinder};
use crate::summarize::{Fact, Summarizer};
use crate::topics::topic_for_day;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectTopic,
    FindSource,
    Summarize,
    Compose,
    GenerateImage,
    ApplyMark,
    AwaitDecision,
    Publish,
    RecordSource,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::SelectTopic => "select_topic",
            Stage::FindSource => "find_source",
            Stage::Summarize => "summarize",
            Stage::Compose => "compose",
            Stage::GenerateImage => "generate_image",
            Stage::ApplyMark => "apply_mark",
            Stage::AwaitDecision => "await_decision",
            Stage::Publish => "publish",
            Stage::RecordSource => "record_source",
        };
        f.write_str(s)
    }
}

fn stage_span(stage: Stage) -> Span {
    info_span!("stage", stage = %stage)
}

/// External capabilities. Image generation and publishing are optional so a
/// text-only run needs no credentials for them.
#[derive(Clone)]
pub struct Capabilities {
    pub search: Arc<dyn ArticleSearch>,
    pub summarizer: Arc<dyn ArticleSummarizer>,
    pub writer: Arc<dyn PostWriter>,
    pub images: Option<Arc<dyn ImageGenerator>>,
    pub publisher: Option<Arc<dyn Publisher>>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub search_attempts: u32,
    pub summary_max_words: usize,
    pub post_max_words: usize,
    pub extra_denylist: Vec<String>,
    pub trailer: String,
    pub mark_file: PathBuf,
}

impl From<&BotConfig> for PipelineSettings {
    fn from(cfg: &BotConfig) -> Self {
        Self {
            search_attempts: cfg.pipeline.search_attempts,
            summary_max_words: cfg.pipeline.summary_max_words,
            post_max_words: cfg.pipeline.post_max_words,
            extra_denylist: cfg.pipeline.extra_denylist.clone(),
            trailer: cfg.pipeline.trailer.clone(),
            mark_file: cfg.paths.mark_file.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&BotConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Wall clock of the run: picks the topic, names the files.
    pub now: NaiveDateTime,
    pub tone: Tone,
    pub generate_image: bool,
    pub apply_mark: bool,
    pub trailer: bool,
}

impl RunOptions {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now,
            tone: Tone::Standard,
            generate_image: false,
            apply_mark: true,
            trailer: false,
        }
    }

    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
    pub identity: Identity,
    pub include_image: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            identity: Identity::Personal,
            include_image: true,
        }
    }
}

/// Everything one run produced, handed to the publish gate.
#[derive(Debug, Clone)]
pub struct ContentBundle {
    pub date: NaiveDate,
    pub topic: String,
    pub source: ArticleReference,
    pub fact: Fact,
    pub post: PostDraft,
    pub image: Option<ImageArtifact>,
    pub fact_path: PathBuf,
    pub post_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Declined,
    Published(PublishReceipt),
}

pub struct Pipeline {
    caps: Capabilities,
    topics: Vec<String>,
    store: ArtifactStore,
    ledger: UsedSourceLedger,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        caps: Capabilities,
        topics: Vec<String>,
        store: ArtifactStore,
        ledger: UsedSourceLedger,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            caps,
            topics,
            store,
            ledger,
            settings,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn ledger(&self) -> &UsedSourceLedger {
        &self.ledger
    }

    /// Run up to the decision point. Fact and post files are written as soon
    /// as they exist; a failed run leaves whatever was finished before it.
    pub async fn run(&self, opts: &RunOptions) -> Result<ContentBundle, BotError> {
        let date = opts.now.date();

        let topic = stage_span(Stage::SelectTopic)
            .in_scope(|| topic_for_day(&self.topics, date.day()).map(str::to_string))?;
        info!(%date, topic = %topic, "topic selected");

        let used = self.ledger.load();
        let finder = SourceFinder::new(self.caps.search.clone(), self.settings.search_attempts)
            .with_extra_denylist(self.settings.extra_denylist.iter().cloned());
        let source = finder
            .find_article(&topic, &used)
            .instrument(stage_span(Stage::FindSource))
            .await
            .ok_or_else(|| BotError::SourceNotFound {
                topic: topic.clone(),
                attempts: finder.max_attempts(),
            })?;

        let summarizer = Summarizer::new(
            self.caps.summarizer.clone(),
            self.settings.summary_max_words,
        );
        let fact = summarizer
            .summarize(source.as_str())
            .instrument(stage_span(Stage::Summarize))
            .await?;
        let fact_path = self
            .store
            .write_fact(date, &topic, &fact, source.as_str())?;

        let composer = PostComposer::new(self.caps.writer.clone(), self.settings.post_max_words)
            .with_trailer(opts.trailer.then(|| self.settings.trailer.clone()));
        let post = composer
            .compose(&topic, &fact, source.as_str(), opts.tone)
            .instrument(stage_span(Stage::Compose))
            .await;
        let post_path = self.store.write_post(date, &post)?;

        let image = if opts.generate_image {
            self.illustrate(&topic, opts).await
        } else {
            None
        };

        Ok(ContentBundle {
            date,
            topic,
            source,
            fact,
            post,
            image,
            fact_path,
            post_path,
        })
    }

    /// Image plus optional mark. Every failure here degrades to "no image"
    /// or "unmarked image".
    async fn illustrate(&self, topic: &str, opts: &RunOptions) -> Option<ImageArtifact> {
        let Some(generator) = self.caps.images.clone() else {
            warn!("image requested but no image generator is configured");
            return None;
        };
        let producer = ImageProducer::new(generator, self.store.images_dir());
        let mut artifact = producer
            .generate(topic, opts.now)
            .instrument(stage_span(Stage::GenerateImage))
            .await?;

        if opts.apply_mark {
            stage_span(Stage::ApplyMark).in_scope(|| {
                match mark_artifact(&mut artifact, &self.settings.mark_file) {
                    Ok(MarkOutcome::Applied(_)) | Ok(MarkOutcome::AlreadyMarked) => {}
                    Ok(MarkOutcome::SkippedMissingMark) => {
                        info!(mark = %self.settings.mark_file.display(), "image left unmarked")
                    }
                    Err(e) => warn!(error = %e, "brand mark failed, keeping unmarked image"),
                }
            });
        }
        Some(artifact)
    }

    /// Fails when no publisher is wired in or it cannot post as the chosen
    /// identity. Run it before producing content.
    pub fn check_publish(&self, opts: &PublishOptions) -> Result<(), BotError> {
        self.ready_publisher(opts).map(|_| ())
    }

    fn ready_publisher(&self, opts: &PublishOptions) -> Result<&dyn Publisher, BotError> {
        let publisher = self
            .caps
            .publisher
            .as_deref()
            .ok_or_else(|| BotError::config("no publisher configured"))?;
        publisher
            .ready_for(opts.identity)
            .map_err(|e| match e {
                PublishError::Configuration(msg) => BotError::Configuration(msg),
                other => BotError::Publish(other),
            })?;
        Ok(publisher)
    }

    /// Readiness check, gate, publisher, then ledger. Rejection and decline
    /// leave the ledger untouched.
    pub async fn publish(
        &self,
        bundle: &ContentBundle,
        opts: &PublishOptions,
        gate: &dyn PublishGate,
    ) -> Result<PublishOutcome, BotError> {
        let publisher = self.ready_publisher(opts)?;

        let approved = stage_span(Stage::AwaitDecision).in_scope(|| gate.approve(bundle));
        if !approved {
            info!(post = %bundle.post_path.display(), "publishing declined, drafts kept");
            return Ok(PublishOutcome::Declined);
        }

        let image = if opts.include_image {
            let path = bundle.image.as_ref().map(|i| i.path.clone());
            if path.is_none() {
                info!("no image available, publishing text only");
            }
            path
        } else {
            None
        };
        let request = PublishRequest {
            identity: opts.identity,
            text: bundle.post.text.clone(),
            image,
        };

        let receipt = match publisher
            .publish(&request)
            .instrument(stage_span(Stage::Publish))
            .await
        {
            Ok(r) => r,
            Err(PublishError::Configuration(msg)) => {
                warn!(error = %msg, "publisher not configured, source not recorded");
                return Err(BotError::Configuration(msg));
            }
            Err(e) => {
                warn!(error = %e, "publishing failed, source not recorded");
                return Err(e.into());
            }
        };

        stage_span(Stage::RecordSource).in_scope(|| {
            self.ledger
                .record(bundle.source.as_str())
                .map_err(|e| BotError::artifact(self.ledger.path(), e))
        })?;

        Ok(PublishOutcome::Published(receipt))
    }
}
