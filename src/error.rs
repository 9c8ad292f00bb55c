// src/error.rs
//! Typed failures of the daily pipeline.
//!
//! Component-local failures (post generation, image generation) are absorbed
//! where they happen and never show up here. What remains are the conditions
//! that end a run or that the caller has to report.

use std::path::PathBuf;

use thiserror::Error;

/// A call to an external capability (search, summarize, compose, image) failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unusable response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Build a `Status` error, keeping only the head of large bodies.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.chars().count() > 500 {
            body = body.chars().take(500).collect();
        }
        Self::Status { status, body }
    }
}

/// The publishing platform refused or could not take the post.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publishing transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("platform rejected the post (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("image upload failed: {0}")]
    Upload(String),

    #[error("publisher is not configured: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(e))
    }
}

/// Pipeline-level error. Anything of this type aborts the current run.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no acceptable source article for topic '{topic}' after {attempts} attempt(s)")]
    SourceNotFound { topic: String, attempts: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("could not write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BotError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn artifact(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Artifact {
            path: path.into(),
            source,
        }
    }

    /// Process exit status the binary reports for this error.
    ///
    /// Platform rejection is a per-item failure: it is reported and the
    /// process still ends normally, drafts stay on disk for a manual retry.
    pub fn exit_code(&self) -> i32 {
        match self {
            BotError::Publish(PublishError::Configuration(_)) => 1,
            BotError::Publish(_) => 0,
            _ => 1,
        }
    }
}
