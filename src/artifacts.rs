// src/artifacts.rs
//! Draft files under the output directory: facts/, posts/, images/.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::compose::{citation, PostDraft};
use crate::error::BotError;
use crate::source::ledger::write_atomic;
use crate::summarize::Fact;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn facts_dir(&self) -> PathBuf {
        self.root.join("facts")
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.root.join("posts")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn fact_path(&self, date: NaiveDate) -> PathBuf {
        self.facts_dir()
            .join(format!("daily_fact_{}.txt", date.format("%Y-%m-%d")))
    }

    pub fn post_path(&self, date: NaiveDate, draft: &PostDraft) -> PathBuf {
        let suffix = draft
            .tone
            .file_suffix()
            .map(|s| format!("_{s}"))
            .unwrap_or_default();
        self.posts_dir()
            .join(format!("post_{}{suffix}.md", date.format("%Y-%m-%d")))
    }

    pub fn write_fact(
        &self,
        date: NaiveDate,
        topic: &str,
        fact: &Fact,
        source_url: &str,
    ) -> Result<PathBuf, BotError> {
        let path = self.fact_path(date);
        let body = render_fact(date, topic, fact, source_url);
        write_atomic(&path, body.as_bytes()).map_err(|e| BotError::artifact(&path, e))?;
        info!(path = %path.display(), "fact saved");
        Ok(path)
    }

    pub fn write_post(&self, date: NaiveDate, draft: &PostDraft) -> Result<PathBuf, BotError> {
        let path = self.post_path(date, draft);
        write_atomic(&path, draft.text.as_bytes()).map_err(|e| BotError::artifact(&path, e))?;
        info!(path = %path.display(), tone = %draft.tone, "post saved");
        Ok(path)
    }
}

pub fn render_fact(date: NaiveDate, topic: &str, fact: &Fact, source_url: &str) -> String {
    format!(
        "DAILY FACT - {}\nTopic: {topic}\n\n{fact}\n\n{}\n",
        date.format("%Y-%m-%d"),
        citation(source_url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Tone;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn fact_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let fact = Fact::from("Bees dance.".to_string());
        let path = store
            .write_fact(date(), "Biology", &fact, "https://example.com/bees")
            .unwrap();

        assert_eq!(path, dir.path().join("facts/daily_fact_2025-03-14.txt"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "DAILY FACT - 2025-03-14\nTopic: Biology\n\nBees dance.\n\nSource: https://example.com/bees\n"
        );
    }

    #[test]
    fn post_file_name_follows_tone() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut draft = PostDraft {
            text: "hello".into(),
            tone: Tone::Standard,
            used_fallback: false,
            citation_detected: false,
        };
        let standard = store.write_post(date(), &draft).unwrap();
        draft.tone = Tone::Conversational;
        let casual = store.write_post(date(), &draft).unwrap();

        assert!(standard.ends_with("posts/post_2025-03-14.md"));
        assert!(casual.ends_with("posts/post_2025-03-14_conversational.md"));
        assert_eq!(std::fs::read_to_string(casual).unwrap(), "hello");
    }

    #[test]
    fn unwritable_root_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = ArtifactStore::new(&blocker);
        let err = store
            .write_fact(date(), "t", &Fact::from("f".to_string()), "https://e.com")
            .unwrap_err();
        assert!(matches!(err, BotError::Artifact { .. }));
    }
}
