// src/publish/mod.rs
pub mod linkedin;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

/// Who the post appears to come from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    #[default]
    Personal,
    Organization,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Personal => f.write_str("personal"),
            Identity::Organization => f.write_str("organization"),
        }
    }
}

/// One post to push: text plus an optional image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub identity: Identity,
    pub text: String,
    pub image: Option<PathBuf>,
}

/// Platform confirmation of a published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub identity: Identity,
    pub status: u16,
    pub post_id: Option<String>,
    pub image_asset: Option<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Pre-flight check that posting as `identity` is configured. Makes no
    /// network call.
    fn ready_for(&self, _identity: Identity) -> Result<(), PublishError> {
        Ok(())
    }

    /// `Ok` only once the platform has confirmed the post.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError>;
}
