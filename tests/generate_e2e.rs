// tests/generate_e2e.rs
//
// Whole-pipeline generation against the mock engine and a temp directory:
// artifact records, idempotency, safety short-circuits, and queue batches.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use reddit_narrator::engine::{MockEngine, NarrationEngine};
use reddit_narrator::error::NarratorError;
use reddit_narrator::generate::{process_queue, AudioGenerator, GenerateOptions};
use reddit_narrator::post::Post;
use reddit_narrator::queue::store::MemoryStore;
use reddit_narrator::queue::{AudioQueue, QueueStatus};
use reddit_narrator::storage::AudioStorage;
use reddit_narrator::textproc::safety::SafetyPolicy;

fn post(id: &str) -> Post {
    Post {
        id: id.into(),
        title: "A short story about nothing".into(),
        body: "It was a quiet day and absolutely nothing of note happened to anyone.".into(),
        author: "someone".into(),
        subreddit: "stories".into(),
        score: 420,
        comment_count: 7,
        created_at: Utc::now(),
        is_self_text: true,
        is_video: false,
        is_adult_flagged: false,
        permalink: String::new(),
        url: String::new(),
    }
}

fn generator(engine: NarrationEngine, dir: &std::path::Path) -> AudioGenerator {
    AudioGenerator::new(
        engine,
        Arc::new(AudioStorage::open(dir).unwrap()),
        SafetyPolicy::default(),
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn artifact_records_the_full_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());

    let artifact = g.generate(&post("p1"), &GenerateOptions::default()).await.unwrap();
    assert_eq!(artifact.post_id, "p1");
    assert!(artifact.success);
    assert_eq!(artifact.engine, "mock");
    assert_eq!(artifact.subreddit, "stories");
    assert_eq!(artifact.text_hash.len(), 16);
    assert!(artifact.file_path.ends_with(".mp3"));
    assert!(std::path::Path::new(&artifact.file_path).exists());

    // The record is durable: a fresh storage over the same dir sees it.
    let reopened = AudioStorage::open(dir.path()).unwrap();
    assert!(reopened.audio_exists("p1"));
}

#[tokio::test]
async fn adult_flag_short_circuits_before_any_text_processing() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());

    let mut p = post("nsfw");
    p.is_adult_flagged = true;

    let err = g.generate(&p, &GenerateOptions::default()).await.unwrap_err();
    assert!(matches!(err, NarratorError::ContentFiltered { .. }));
    assert_eq!(err.code(), "content_filtered");
    assert!(!err.is_retryable());

    let NarrationEngine::Mock(mock) = g.engine() else {
        panic!("mock engine expected")
    };
    assert_eq!(mock.call_count(), 0, "engine must never see adult content");
    assert!(g.storage().get("nsfw").is_none());
}

#[tokio::test]
async fn too_short_narration_is_filtered_not_synthesized() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());

    let mut p = post("tiny");
    p.title = "Hi".into();
    p.body = String::new();

    let err = g.generate(&p, &GenerateOptions::default()).await.unwrap_err();
    assert!(matches!(err, NarratorError::ContentFiltered { .. }));
    let NarrationEngine::Mock(mock) = g.engine() else {
        panic!("mock engine expected")
    };
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn markup_padded_short_text_is_filtered_not_synthesized() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());

    // The tags survive normalization; once stripped the text is "Hi.",
    // far under the narratable minimum.
    let mut p = post("tagged");
    p.title = "<b>Hi</b>".into();
    p.body = String::new();

    let err = g.generate(&p, &GenerateOptions::default()).await.unwrap_err();
    assert!(matches!(err, NarratorError::ContentFiltered { .. }));
    let NarrationEngine::Mock(mock) = g.engine() else {
        panic!("mock engine expected")
    };
    assert_eq!(mock.call_count(), 0, "markup padding must not rescue short text");
    assert!(g.storage().get("tagged").is_none());
}

#[tokio::test]
async fn tag_characters_stay_out_of_the_filename_slug() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());

    let mut p = post("slugged");
    p.title = "<em>A real story</em>".into();

    let artifact = g.generate(&p, &GenerateOptions::default()).await.unwrap();
    let filename = std::path::Path::new(&artifact.file_path)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(
        filename.starts_with("stories_a_real_story_"),
        "unexpected filename {filename}"
    );
    assert_eq!(artifact.title, "A real story.");
}

#[tokio::test]
async fn heavily_profane_text_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());

    // 4 profane words out of 10 is well above the ratio cap.
    let mut p = post("sweary");
    p.title = "A rant".into();
    p.body = "fuck this shit and fuck that shit said the angry man".into();

    let err = g.generate(&p, &GenerateOptions::default()).await.unwrap_err();
    assert!(matches!(err, NarratorError::ContentFiltered { .. }));
}

#[tokio::test]
async fn engine_failure_maps_to_a_retryable_error() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(
        NarrationEngine::Mock(MockEngine::failing("engine down")),
        dir.path(),
    );

    let err = g.generate(&post("p1"), &GenerateOptions::default()).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), "engine");
}

#[tokio::test]
async fn batch_mixes_successes_and_failures_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());
    let queue = Mutex::new(AudioQueue::open(Box::new(MemoryStore::new())).unwrap());

    let mut adult = post("nsfw");
    adult.is_adult_flagged = true;

    let (ok_id, bad_id) = {
        let mut q = queue.lock().unwrap();
        let ok = q.enqueue(post("good"), 5).unwrap();
        let bad = q.enqueue(adult, 9).unwrap();
        (ok, bad)
    };

    let stats = process_queue(&queue, &g, 10, &GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);

    let q = queue.lock().unwrap();
    let ok = q.get(&ok_id).unwrap();
    assert_eq!(ok.status, QueueStatus::Completed);
    assert!(ok.result.as_ref().is_some_and(|a| a.success));
    let bad = q.get(&bad_id).unwrap();
    assert_eq!(bad.status, QueueStatus::Failed);
    assert_eq!(bad.attempts, 1);
    assert!(bad
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("content filtered")));
}

#[tokio::test]
async fn processed_batch_leaves_nothing_pending() {
    let dir = tempfile::tempdir().unwrap();
    let g = generator(NarrationEngine::Mock(MockEngine::new()), dir.path());
    let queue = Mutex::new(AudioQueue::open(Box::new(MemoryStore::new())).unwrap());

    {
        let mut q = queue.lock().unwrap();
        for i in 0..5 {
            q.enqueue(post(&format!("p{i}")), (i % 3) as i64 + 1).unwrap();
        }
    }

    let stats = process_queue(&queue, &g, 10, &GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(stats.processed, 5);
    assert_eq!(stats.successful, 5);

    let stats = queue.lock().unwrap().stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processing, 0);
    assert_eq!(stats.completed, 5);
}
