// tests/pipeline_run.rs
mod common;

use std::sync::Arc;

use common::*;
use daily_knowledge_bot::compose::Tone;
use daily_knowledge_bot::{BotError, RunOptions};

const FRESH: &str = "https://example.com/octopus-hearts";

#[tokio::test]
async fn topic_follows_day_of_month() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline_in(dir.path(), &["AI", "History"], text_caps(ScriptedSearch::new(&[FRESH])));

    let day3 = p.run(&RunOptions::at(at(2025, 1, 3))).await.unwrap();
    assert_eq!(day3.topic, "AI");
    let day4 = p.run(&RunOptions::at(at(2025, 1, 4))).await.unwrap();
    assert_eq!(day4.topic, "History");

    let fact = std::fs::read_to_string(&day3.fact_path).unwrap();
    assert!(fact.starts_with("DAILY FACT - 2025-01-03\nTopic: AI\n\n"));
    assert!(fact.ends_with(&format!("Source: {FRESH}\n")));
}

#[tokio::test]
async fn empty_topic_list_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let search = ScriptedSearch::new(&[FRESH]);
    let p = pipeline_in(dir.path(), &[], text_caps(search.clone()));

    let err = p.run(&RunOptions::at(at(2025, 1, 1))).await.unwrap_err();
    assert!(matches!(err, BotError::Configuration(_)));
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn denylisted_candidate_is_skipped_for_fresh_one() {
    let dir = tempfile::tempdir().unwrap();
    let wiki = "https://en.wikipedia.org/wiki/Octopus";
    let search = ScriptedSearch::new(&[wiki, FRESH]);
    let p = pipeline_in(dir.path(), &["Biology"], text_caps(search.clone()));

    let bundle = p.run(&RunOptions::at(at(2025, 2, 1))).await.unwrap();
    assert_eq!(bundle.source.as_str(), FRESH);
    assert_eq!(search.calls(), 2);

    // the second attempt is told about the rejected candidate
    let excludes = search.seen_excludes.lock().unwrap();
    assert!(excludes[1].iter().any(|u| u == wiki));
}

#[tokio::test]
async fn used_sources_are_never_returned() {
    let dir = tempfile::tempdir().unwrap();
    let used = "https://example.com/already-posted";
    let p = pipeline_in(
        dir.path(),
        &["Biology"],
        text_caps(ScriptedSearch::new(&["https://EXAMPLE.com/already-posted/", FRESH])),
    );
    p.ledger().record(used).unwrap();

    let bundle = p.run(&RunOptions::at(at(2025, 2, 1))).await.unwrap();
    assert_eq!(bundle.source.as_str(), FRESH);
}

#[tokio::test]
async fn exhausted_search_aborts_without_files() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline_in(
        dir.path(),
        &["Video"],
        text_caps(ScriptedSearch::new(&["https://www.youtube.com/watch?v=1"])),
    );

    let err = p.run(&RunOptions::at(at(2025, 2, 1))).await.unwrap_err();
    match err {
        BotError::SourceNotFound { topic, attempts } => {
            assert_eq!(topic, "Video");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(files_under(&p.store().facts_dir()).is_empty());
    assert!(!p.ledger().path().exists());
}

#[tokio::test]
async fn failing_summarizer_aborts_before_any_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.summarizer = Arc::new(FailingSummarizer);
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let err = p.run(&RunOptions::at(at(2025, 2, 1))).await.unwrap_err();
    assert!(matches!(err, BotError::Transport(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(files_under(&p.store().facts_dir()).is_empty());
    assert!(files_under(&p.store().posts_dir()).is_empty());
    assert!(p.ledger().load().is_empty());
}

#[tokio::test]
async fn writer_failure_falls_back_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.writer = Arc::new(FailingWriter);
    let p = pipeline_in(dir.path(), &["Marine Biology"], caps);

    let bundle = p.run(&RunOptions::at(at(2025, 2, 1))).await.unwrap();
    assert!(bundle.post.used_fallback);
    let text = std::fs::read_to_string(&bundle.post_path).unwrap();
    assert!(text.starts_with("MARINE BIOLOGY\n\n"));
    assert_eq!(text.matches(FRESH).count(), 1);
    assert!(text.ends_with(&format!("Source: {FRESH}")));
}

#[tokio::test]
async fn generated_post_cites_once_within_budget() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline_in(dir.path(), &["Biology"], text_caps(ScriptedSearch::new(&[FRESH])));

    for tone in [Tone::Standard, Tone::Conversational] {
        let opts = RunOptions {
            tone,
            trailer: true,
            ..RunOptions::at(at(2025, 2, 1))
        };
        let bundle = p.run(&opts).await.unwrap();
        assert!(!bundle.post.used_fallback);
        assert_eq!(bundle.post.text.matches(FRESH).count(), 1, "{tone}");
        assert!(bundle.post.word_count() <= 180);
        assert!(bundle.post.text.ends_with("Follow for a new fact every day."));
    }
    let posts = files_under(&p.store().posts_dir());
    assert!(posts.contains(&"post_2025-02-01.md".to_string()));
    assert!(posts.contains(&"post_2025-02-01_conversational.md".to_string()));
}

#[tokio::test]
async fn image_failure_leaves_bundle_without_image() {
    let dir = tempfile::tempdir().unwrap();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.images = Some(FakeImages::failing());
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let opts = RunOptions {
        generate_image: true,
        ..RunOptions::at(at(2025, 2, 1))
    };
    let bundle = p.run(&opts).await.unwrap();
    assert!(bundle.image.is_none());
    assert!(bundle.post_path.exists());
}

#[tokio::test]
async fn image_is_saved_and_marked_when_mark_exists() {
    let dir = tempfile::tempdir().unwrap();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.images = Some(FakeImages::working());
    let p = pipeline_in(dir.path(), &["Deep Sea"], caps);
    let opts = RunOptions {
        generate_image: true,
        ..RunOptions::at(at(2025, 2, 1))
    };

    // no mark file yet: image kept, unmarked
    let unmarked = p.run(&opts).await.unwrap().image.unwrap();
    assert!(!unmarked.marked);
    assert!(unmarked.path.exists());

    let mark_dir = dir.path().join("assets");
    std::fs::create_dir_all(&mark_dir).unwrap();
    image::RgbaImage::from_pixel(20, 10, image::Rgba([255, 255, 255, 255]))
        .save(mark_dir.join("brand_mark.png"))
        .unwrap();

    let marked = p.run(&opts).await.unwrap().image.unwrap();
    assert!(marked.marked);
    let name = marked.path.file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(name, "deep_sea_20250201_093000.png");
    assert_eq!(image::open(&marked.path).unwrap().width(), 200);
}
