// src/config.rs
//! Bot configuration: optional TOML file, environment overrides, validation.
//!
//! Lookup order for the file: explicit path, `$BOT_CONFIG_PATH`,
//! `config/bot.toml`, otherwise built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ai::perplexity::{self, PerplexitySettings};
use crate::compose::count_words;
use crate::error::BotError;
use crate::illustration::gemini::{self, GeminiSettings};
use crate::publish::linkedin::{self, LinkedInSettings};
use crate::source::ledger::DEFAULT_LEDGER_FILE;

const ENV_PATH: &str = "BOT_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "config/bot.toml";

/// Body words that must remain once citation and trailer are placed.
const MIN_BODY_WORDS: usize = 10;

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_topics_file() -> PathBuf {
    PathBuf::from("topics.txt")
}
fn default_mark_file() -> PathBuf {
    PathBuf::from("assets/brand_mark.png")
}
fn default_trailer() -> String {
    "Follow for a new fact every day.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub output_dir: PathBuf,
    pub topics_file: PathBuf,
    /// Defaults to `<output_dir>/used_sources.json`.
    pub ledger_file: Option<PathBuf>,
    pub mark_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            topics_file: default_topics_file(),
            ledger_file: None,
            mark_file: default_mark_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub search_attempts: u32,
    pub summary_max_words: usize,
    pub post_max_words: usize,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    /// Appended after the citation when `--trailer` is given.
    pub trailer: String,
    pub extra_denylist: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_attempts: 3,
            summary_max_words: 100,
            post_max_words: 180,
            request_timeout_secs: 30,
            upload_timeout_secs: 60,
            trailer: default_trailer(),
            extra_denylist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub perplexity_base_url: String,
    pub research_model: String,
    pub writer_model: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub linkedin_base_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            perplexity_base_url: perplexity::DEFAULT_BASE_URL.to_string(),
            research_model: "sonar-pro".to_string(),
            writer_model: "sonar".to_string(),
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            gemini_model: gemini::DEFAULT_MODEL.to_string(),
            linkedin_base_url: linkedin::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Credentials only ever come from the environment (or `.env`).
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub perplexity_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub linkedin_access_token: Option<String>,
    pub linkedin_person_id: Option<String>,
    pub linkedin_organization_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub paths: PathsConfig,
    pub pipeline: PipelineConfig,
    pub endpoints: EndpointsConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

impl BotConfig {
    /// Resolve the file, parse it, apply environment overrides, validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut cfg = match resolve_path(explicit)? {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: BotConfig = toml::from_str(s)?;
        cfg.pipeline.extra_denylist = cfg
            .pipeline
            .extra_denylist
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Ok(cfg)
    }

    /// Secrets always, paths only when set.
    pub fn apply_env(&mut self) {
        self.secrets = Secrets {
            perplexity_api_key: env_value("PERPLEXITY_API_KEY"),
            google_api_key: env_value("GOOGLE_API_KEY"),
            linkedin_access_token: env_value("LINKEDIN_ACCESS_TOKEN"),
            linkedin_person_id: env_value("LINKEDIN_PERSON_ID"),
            linkedin_organization_id: env_value("LINKEDIN_ORGANIZATION_ID"),
        };
        if let Some(dir) = env_value("OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(file) = env_value("TOPICS_FILE") {
            self.paths.topics_file = PathBuf::from(file);
        }
    }

    pub fn validate(&self) -> Result<(), BotError> {
        let p = &self.pipeline;
        if p.search_attempts < 1 {
            return Err(BotError::config("pipeline.search_attempts must be at least 1"));
        }
        if p.summary_max_words < 10 {
            return Err(BotError::config("pipeline.summary_max_words must be at least 10"));
        }
        if p.post_max_words < 20 {
            return Err(BotError::config("pipeline.post_max_words must be at least 20"));
        }
        if p.request_timeout_secs < 1 || p.upload_timeout_secs < 1 {
            return Err(BotError::config("timeouts must be at least 1 second"));
        }
        // citation is two words: label + URL
        let fixed = count_words(&p.trailer) + 2;
        if fixed + MIN_BODY_WORDS > p.post_max_words {
            return Err(BotError::config(format!(
                "pipeline.trailer leaves less than {MIN_BODY_WORDS} words of a {}-word post",
                p.post_max_words
            )));
        }
        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.paths
            .ledger_file
            .clone()
            .unwrap_or_else(|| self.paths.output_dir.join(DEFAULT_LEDGER_FILE))
    }

    pub fn log_path(&self) -> PathBuf {
        self.paths.output_dir.join("daily_knowledge_bot.log")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.upload_timeout_secs)
    }

    pub fn perplexity_settings(&self) -> Result<PerplexitySettings, BotError> {
        let key = require_secret("PERPLEXITY_API_KEY", self.secrets.perplexity_api_key.as_deref())?;
        let mut s = PerplexitySettings::new(key);
        s.base_url = self.endpoints.perplexity_base_url.clone();
        s.research_model = self.endpoints.research_model.clone();
        s.writer_model = self.endpoints.writer_model.clone();
        s.request_timeout = self.request_timeout();
        Ok(s)
    }

    pub fn gemini_settings(&self) -> Result<GeminiSettings, BotError> {
        let key = require_secret("GOOGLE_API_KEY", self.secrets.google_api_key.as_deref())?;
        let mut s = GeminiSettings::new(key);
        s.base_url = self.endpoints.gemini_base_url.clone();
        s.model = self.endpoints.gemini_model.clone();
        // image generation is slow; give it the upload budget
        s.request_timeout = self.upload_timeout();
        Ok(s)
    }

    /// Author ids are checked per identity when publishing.
    pub fn linkedin_settings(&self) -> Result<LinkedInSettings, BotError> {
        let token = require_secret(
            "LINKEDIN_ACCESS_TOKEN",
            self.secrets.linkedin_access_token.as_deref(),
        )?;
        let mut s = LinkedInSettings::new(token);
        s.person_id = self.secrets.linkedin_person_id.clone();
        s.organization_id = self.secrets.linkedin_organization_id.clone();
        s.base_url = self.endpoints.linkedin_base_url.clone();
        s.request_timeout = self.request_timeout();
        s.upload_timeout = self.upload_timeout();
        Ok(s)
    }
}

fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        if !p.exists() {
            return Err(anyhow!("config file {} does not exist", p.display()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    if let Some(p) = env_value(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path {}", pb.display()));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
    Ok(fallback.exists().then_some(fallback))
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

static PLACEHOLDER_RE: OnceCell<Regex> = OnceCell::new();

/// Empty, or a template value such as `YOUR_API_KEY_HERE`.
pub fn is_placeholder(value: &str) -> bool {
    let re = PLACEHOLDER_RE.get_or_init(|| Regex::new(r"(?i)YOUR_[A-Z0-9_]*_HERE").unwrap());
    let v = value.trim();
    v.is_empty() || re.is_match(v)
}

/// A credential that must be present and real.
pub fn require_secret<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, BotError> {
    match value.map(str::trim) {
        Some(v) if !is_placeholder(v) => Ok(v),
        Some(_) => Err(BotError::config(format!("{name} still holds a placeholder value"))),
        None => Err(BotError::config(format!("{name} is not set"))),
    }
}
