// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod ai;
pub mod artifacts;
pub mod compose;
pub mod config;
pub mod confirm;
pub mod error;
pub mod illustration;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod summarize;
pub mod topics;

// ---- Re-exports for stable public API ----
pub use crate::compose::{PostDraft, Tone};
pub use crate::config::BotConfig;
pub use crate::error::{BotError, PublishError, TransportError};
pub use crate::pipeline::{
    Capabilities, ContentBundle, Pipeline, PipelineSettings, PublishOptions, PublishOutcome,
    RunOptions,
};
pub use crate::publish::Identity;
