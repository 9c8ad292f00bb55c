// src/topics.rs
//! Topic rotation: the day of the month picks an entry from an ordered list.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::BotError;

/// Used when no topics file can be read.
pub const DEFAULT_TOPIC: &str = "Artificial Intelligence";

/// `topics[(day - 1) % len]`. Pure; `day` comes from the calendar (1..=31).
pub fn topic_for_day(topics: &[String], day: u32) -> Result<&str, BotError> {
    if topics.is_empty() {
        return Err(BotError::config("topic list is empty"));
    }
    if !(1..=31).contains(&day) {
        return Err(BotError::config(format!(
            "day of month out of range: {day}"
        )));
    }
    let idx = (day as usize - 1) % topics.len();
    Ok(topics[idx].as_str())
}

/// Read one topic per non-blank line. Falls back to `[DEFAULT_TOPIC]`
/// when the file is missing, unreadable or has no topics.
pub fn load_topics(path: &Path) -> Vec<String> {
    let content = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "topics file unavailable, using default topic");
            return default_topics();
        }
    };

    let topics = parse_topics(&content);
    if topics.is_empty() {
        warn!(path = %path.display(), "topics file is empty, using default topic");
        return default_topics();
    }
    info!(count = topics.len(), path = %path.display(), "loaded topics");
    topics
}

pub fn default_topics() -> Vec<String> {
    vec![DEFAULT_TOPIC.to_string()]
}

fn parse_topics(s: &str) -> Vec<String> {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
