// tests/publish_flow.rs
mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::*;
use daily_knowledge_bot::confirm::{AutoApprove, FixedAnswer, PublishGate};
use daily_knowledge_bot::error::PublishError;
use daily_knowledge_bot::publish::linkedin::{LinkedInClient, LinkedInSettings};
use daily_knowledge_bot::{
    BotError, ContentBundle, Identity, PublishOptions, PublishOutcome, RunOptions,
};

const FRESH: &str = "https://example.com/octopus-hearts";

#[tokio::test]
async fn declined_keeps_drafts_and_ledger_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::accepting();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.publisher = Some(publisher.clone());
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let bundle = p.run(&RunOptions::at(at(2025, 4, 2))).await.unwrap();
    let outcome = p
        .publish(&bundle, &PublishOptions::default(), &FixedAnswer(false))
        .await
        .unwrap();

    assert_eq!(outcome, PublishOutcome::Declined);
    assert!(bundle.fact_path.exists());
    assert!(bundle.post_path.exists());
    assert!(!p.ledger().path().exists());
    assert!(publisher.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn confirmed_publish_records_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::accepting();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.publisher = Some(publisher.clone());
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let bundle = p.run(&RunOptions::at(at(2025, 4, 2))).await.unwrap();
    let opts = PublishOptions {
        identity: Identity::Organization,
        include_image: true,
    };
    let outcome = p.publish(&bundle, &opts, &AutoApprove).await.unwrap();

    match outcome {
        PublishOutcome::Published(receipt) => {
            assert_eq!(receipt.identity, Identity::Organization);
            assert_eq!(receipt.post_id.as_deref(), Some("urn:li:share:42"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let sent = publisher.requests.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, bundle.post.text);
    assert!(sent[0].image.is_none());

    let used = p.ledger().load();
    assert_eq!(used.len(), 1);
    assert!(used.contains(FRESH));
}

#[tokio::test]
async fn denylisted_url_never_reaches_the_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let mut caps = text_caps(ScriptedSearch::new(&[
        "https://www.britannica.com/animal/octopus",
        FRESH,
    ]));
    caps.publisher = Some(RecordingPublisher::accepting());
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let bundle = p.run(&RunOptions::at(at(2025, 4, 2))).await.unwrap();
    p.publish(&bundle, &PublishOptions::default(), &AutoApprove)
        .await
        .unwrap();

    let used = p.ledger().load();
    assert_eq!(used.into_iter().collect::<Vec<_>>(), vec![FRESH.to_string()]);
}

#[tokio::test]
async fn rejection_is_reported_and_ledger_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.publisher = Some(RecordingPublisher::rejecting());
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let bundle = p.run(&RunOptions::at(at(2025, 4, 2))).await.unwrap();
    let err = p
        .publish(&bundle, &PublishOptions::default(), &AutoApprove)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BotError::Publish(PublishError::Rejected { status: 422, .. })
    ));
    assert_eq!(err.exit_code(), 0);
    assert!(p.ledger().load().is_empty());
    assert!(bundle.post_path.exists());
}

#[tokio::test]
async fn image_is_attached_unless_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::accepting();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.images = Some(FakeImages::working());
    caps.publisher = Some(publisher.clone());
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let opts = RunOptions {
        generate_image: true,
        ..RunOptions::at(at(2025, 4, 2))
    };
    let bundle = p.run(&opts).await.unwrap();
    let image_path = bundle.image.as_ref().unwrap().path.clone();

    p.publish(&bundle, &PublishOptions::default(), &AutoApprove)
        .await
        .unwrap();
    let text_only = PublishOptions {
        include_image: false,
        ..PublishOptions::default()
    };
    p.publish(&bundle, &text_only, &AutoApprove).await.unwrap();

    let sent = publisher.requests.lock().unwrap();
    assert_eq!(sent[0].image.as_deref(), Some(image_path.as_path()));
    assert!(sent[1].image.is_none());
}

#[tokio::test]
async fn ledger_write_failure_after_publish_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.publisher = Some(RecordingPublisher::accepting());
    let p = pipeline_in(dir.path(), &["Biology"], caps);
    // a directory where the ledger file should be
    std::fs::create_dir_all(p.ledger().path()).unwrap();

    let bundle = p.run(&RunOptions::at(at(2025, 4, 2))).await.unwrap();
    let err = p
        .publish(&bundle, &PublishOptions::default(), &AutoApprove)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Artifact { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn missing_publisher_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline_in(dir.path(), &["Biology"], text_caps(ScriptedSearch::new(&[FRESH])));

    let bundle = p.run(&RunOptions::at(at(2025, 4, 2))).await.unwrap();
    let err = p
        .publish(&bundle, &PublishOptions::default(), &AutoApprove)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::Configuration(_)));
}

/// Approves, remembering that it was asked.
#[derive(Default)]
struct WatchingGate(AtomicBool);

impl PublishGate for WatchingGate {
    fn approve(&self, _bundle: &ContentBundle) -> bool {
        self.0.store(true, Ordering::SeqCst);
        true
    }
}

#[tokio::test]
async fn unconfigured_identity_fails_before_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = LinkedInSettings::new("li-token");
    settings.person_id = Some("abc".into());
    // nothing listens here; the check must fail before any request
    settings.base_url = "http://127.0.0.1:9".into();
    let mut caps = text_caps(ScriptedSearch::new(&[FRESH]));
    caps.publisher = Some(Arc::new(LinkedInClient::new(settings).unwrap()));
    let p = pipeline_in(dir.path(), &["Biology"], caps);

    let org = PublishOptions {
        identity: Identity::Organization,
        include_image: false,
    };
    let early = p.check_publish(&org).unwrap_err();
    assert!(matches!(early, BotError::Configuration(_)));
    assert_eq!(early.exit_code(), 1);
    assert!(p.check_publish(&PublishOptions::default()).is_ok());

    let bundle = p.run(&RunOptions::at(at(2025, 4, 2))).await.unwrap();
    let gate = WatchingGate::default();
    let err = p.publish(&bundle, &org, &gate).await.unwrap_err();

    assert!(err.to_string().contains("LINKEDIN_ORGANIZATION_ID"));
    assert_eq!(err.exit_code(), 1);
    assert!(!gate.0.load(Ordering::SeqCst));
    assert!(!p.ledger().path().exists());
}
