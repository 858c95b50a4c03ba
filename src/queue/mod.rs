//! Durable, priority-ordered queue of post-to-audio jobs.
//!
//! Lifecycle: `pending -> processing -> {completed | failed}`, with
//! `failed -> pending` allowed only through manual retry while under the
//! attempt cap. Illegal transitions are logged and ignored, never panics.
//! Every mutation persists the whole snapshot before returning, so a crash
//! mid-batch leaves prior outcomes durably recorded.

pub mod store;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::NarratorError;
use crate::post::Post;
use crate::storage::AudioArtifact;
use store::QueueStore;

/// Failed items at or above this many attempts are no longer retry-eligible.
pub const MAX_ATTEMPTS: u32 = 3;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("queue_enqueued_total", "Items added to the audio queue.");
        describe_counter!("queue_completed_total", "Queue items that finished successfully.");
        describe_counter!("queue_failed_total", "Queue items that finished in failure.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// The only legal transitions. `failed -> pending` is additionally gated on
/// the attempt cap by `retry_failed`.
fn legal_transition(from: QueueStatus, to: QueueStatus) -> bool {
    use QueueStatus::*;
    matches!(
        (from, to),
        (Pending, Processing) | (Processing, Completed) | (Processing, Failed) | (Failed, Pending)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// `{post_id}_{enqueue_epoch_secs}`. Re-enqueueing the same post within
    /// one second collides; a known limitation carried over deliberately.
    pub id: String,
    pub post_id: String,
    /// Full post snapshot at enqueue time; the queue never re-fetches.
    pub post: Post,
    pub priority: u8,
    pub status: QueueStatus,
    pub added_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub result: Option<AudioArtifact>,
}

/// Outcome of one generation attempt, recorded via `mark_outcome`.
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed(AudioArtifact),
    Failed(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub by_priority: BTreeMap<u8, usize>,
    pub by_subreddit: BTreeMap<String, usize>,
}

pub struct AudioQueue {
    store: Box<dyn QueueStore>,
    items: HashMap<String, QueueItem>,
}

impl AudioQueue {
    /// Load the persisted snapshot (empty if none exists yet).
    pub fn open(store: Box<dyn QueueStore>) -> Result<Self, NarratorError> {
        ensure_metrics_described();
        let items = store.load()?;
        tracing::info!(items = items.len(), "audio queue loaded");
        Ok(Self { store, items })
    }

    /// Add a post with a priority clamped to 1..=10. Returns the queue id.
    pub fn enqueue(&mut self, post: Post, priority: i64) -> Result<String, NarratorError> {
        let priority = priority.clamp(1, 10) as u8;
        let now = Utc::now();
        let id = format!("{}_{}", post.id, now.timestamp());

        let item = QueueItem {
            id: id.clone(),
            post_id: post.id.clone(),
            post,
            priority,
            status: QueueStatus::Pending,
            added_at: now,
            processed_at: None,
            attempts: 0,
            last_error: None,
            result: None,
        };

        tracing::info!(queue_id = %id, priority, "post enqueued");
        counter!("queue_enqueued_total").increment(1);
        self.items.insert(id.clone(), item);
        self.persist()?;
        Ok(id)
    }

    /// Default priority derived from post score: one priority band per 100
    /// points, clamped to 1..=10.
    pub fn priority_for_score(score: i64) -> i64 {
        (score / 100).clamp(1, 10)
    }

    /// Claim up to `max_items` pending items, highest priority first, FIFO
    /// within a priority band. Claimed items transition to processing and
    /// the snapshot is persisted before they are returned, so sequential
    /// calls never double-claim.
    pub fn claim_pending(&mut self, max_items: usize) -> Result<Vec<QueueItem>, NarratorError> {
        let mut pending: Vec<&QueueItem> = self
            .items
            .values()
            .filter(|item| item.status == QueueStatus::Pending)
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.added_at.cmp(&b.added_at))
        });

        let claimed_ids: Vec<String> = pending
            .into_iter()
            .take(max_items)
            .map(|item| item.id.clone())
            .collect();

        let mut claimed = Vec::with_capacity(claimed_ids.len());
        for id in &claimed_ids {
            if let Some(item) = self.items.get_mut(id) {
                item.status = QueueStatus::Processing;
                claimed.push(item.clone());
            }
        }
        if !claimed.is_empty() {
            self.persist()?;
        }
        Ok(claimed)
    }

    /// Record the outcome of one attempt: bumps the attempt counter, stamps
    /// `processed_at`, and persists immediately (never batched).
    pub fn mark_outcome(&mut self, queue_id: &str, outcome: Outcome) -> Result<(), NarratorError> {
        let Some(item) = self.items.get_mut(queue_id) else {
            tracing::error!(queue_id, "mark_outcome on unknown queue item");
            return Ok(());
        };

        let to = match outcome {
            Outcome::Completed(_) => QueueStatus::Completed,
            Outcome::Failed(_) => QueueStatus::Failed,
        };
        if !legal_transition(item.status, to) {
            tracing::error!(queue_id, from = ?item.status, to = ?to, "illegal queue transition ignored");
            return Ok(());
        }

        item.attempts += 1;
        item.processed_at = Some(Utc::now());
        match outcome {
            Outcome::Completed(artifact) => {
                item.status = QueueStatus::Completed;
                item.result = Some(artifact);
                item.last_error = None;
                counter!("queue_completed_total").increment(1);
            }
            Outcome::Failed(error) => {
                item.status = QueueStatus::Failed;
                item.last_error = Some(error);
                counter!("queue_failed_total").increment(1);
            }
        }
        self.persist()
    }

    /// Pure aggregation over the in-memory map.
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.items.len(),
            ..Default::default()
        };
        for item in self.items.values() {
            match item.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Processing => stats.processing += 1,
                QueueStatus::Completed => stats.completed += 1,
                QueueStatus::Failed => stats.failed += 1,
            }
            *stats.by_priority.entry(item.priority).or_insert(0) += 1;
            *stats.by_subreddit.entry(item.post.subreddit.clone()).or_insert(0) += 1;
        }
        stats
    }

    /// One item by queue id.
    pub fn get(&self, queue_id: &str) -> Option<&QueueItem> {
        self.items.get(queue_id)
    }

    /// Remove completed items; returns how many were removed.
    pub fn clear_completed(&mut self) -> Result<usize, NarratorError> {
        let before = self.items.len();
        self.items.retain(|_, item| item.status != QueueStatus::Completed);
        let removed = before - self.items.len();
        if removed > 0 {
            tracing::info!(removed, "cleared completed queue items");
            self.persist()?;
        }
        Ok(removed)
    }

    /// Reset failed items under the attempt cap back to pending, clearing
    /// their last error. Returns the reset queue ids.
    pub fn retry_failed(&mut self) -> Result<Vec<String>, NarratorError> {
        let mut reset = Vec::new();
        for (id, item) in self.items.iter_mut() {
            if item.status == QueueStatus::Failed && item.attempts < MAX_ATTEMPTS {
                item.status = QueueStatus::Pending;
                item.last_error = None;
                reset.push(id.clone());
            }
        }
        if !reset.is_empty() {
            tracing::info!(count = reset.len(), "failed queue items reset for retry");
            self.persist()?;
        }
        Ok(reset)
    }

    pub fn clear_all(&mut self) -> Result<usize, NarratorError> {
        let removed = self.items.len();
        self.items.clear();
        self.persist()?;
        Ok(removed)
    }

    fn persist(&self) -> Result<(), NarratorError> {
        self.store.save(&self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::store::MemoryStore;
    use super::*;
    use chrono::Utc;

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            title: "title".into(),
            body: "body".into(),
            author: "a".into(),
            subreddit: "rust".into(),
            score: 100,
            comment_count: 0,
            created_at: Utc::now(),
            is_self_text: true,
            is_video: false,
            is_adult_flagged: false,
            permalink: String::new(),
            url: String::new(),
        }
    }

    fn queue() -> AudioQueue {
        AudioQueue::open(Box::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn priority_is_clamped() {
        let mut q = queue();
        let id_low = q.enqueue(post("a"), -4).unwrap();
        let id_high = q.enqueue(post("b"), 99).unwrap();
        assert_eq!(q.get(&id_low).unwrap().priority, 1);
        assert_eq!(q.get(&id_high).unwrap().priority, 10);
    }

    #[test]
    fn claim_flips_to_processing_and_does_not_double_claim() {
        let mut q = queue();
        q.enqueue(post("a"), 5).unwrap();
        let first = q.claim_pending(10).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, QueueStatus::Processing);
        assert!(q.claim_pending(10).unwrap().is_empty());
    }

    #[test]
    fn illegal_transition_is_a_logged_noop() {
        let mut q = queue();
        let id = q.enqueue(post("a"), 5).unwrap();
        // Completing a pending (unclaimed) item is illegal.
        q.mark_outcome(&id, Outcome::Failed("nope".into())).unwrap();
        let item = q.get(&id).unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.attempts, 0);
    }

    #[test]
    fn outcome_bumps_attempts_and_stamps_processed_at() {
        let mut q = queue();
        let id = q.enqueue(post("a"), 5).unwrap();
        q.claim_pending(1).unwrap();
        q.mark_outcome(&id, Outcome::Failed("engine down".into())).unwrap();
        let item = q.get(&id).unwrap();
        assert_eq!(item.status, QueueStatus::Failed);
        assert_eq!(item.attempts, 1);
        assert!(item.processed_at.is_some());
        assert_eq!(item.last_error.as_deref(), Some("engine down"));
    }

    #[test]
    fn retry_respects_attempt_cap() {
        let mut q = queue();
        let id = q.enqueue(post("a"), 5).unwrap();

        for _ in 0..MAX_ATTEMPTS {
            q.claim_pending(1).unwrap();
            q.mark_outcome(&id, Outcome::Failed("boom".into())).unwrap();
            q.retry_failed().unwrap();
        }
        // Three attempts exhausted automatic eligibility.
        assert_eq!(q.get(&id).unwrap().attempts, MAX_ATTEMPTS);
        assert_eq!(q.get(&id).unwrap().status, QueueStatus::Failed);
        assert!(q.retry_failed().unwrap().is_empty());
    }

    #[test]
    fn stats_aggregate_by_status_priority_and_subreddit() {
        let mut q = queue();
        q.enqueue(post("a"), 5).unwrap();
        q.enqueue(post("b"), 5).unwrap();
        let mut other = post("c");
        other.subreddit = "python".into();
        q.enqueue(other, 9).unwrap();

        let stats = q.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.by_priority.get(&5), Some(&2));
        assert_eq!(stats.by_subreddit.get("python"), Some(&1));
    }

    #[test]
    fn clear_completed_removes_only_completed() {
        let mut q = queue();
        let done = q.enqueue(post("a"), 5).unwrap();
        q.enqueue(post("b"), 5).unwrap();
        q.claim_pending(1).unwrap();
        // claim_pending(1) claimed one of the two; finish whichever it was.
        let claimed: Vec<String> = q
            .items
            .values()
            .filter(|i| i.status == QueueStatus::Processing)
            .map(|i| i.id.clone())
            .collect();
        for id in claimed {
            let artifact = crate::storage::AudioArtifact {
                post_id: "a".into(),
                file_path: "x.mp3".into(),
                duration_seconds: 1.0,
                file_size_bytes: 1,
                voice: "v".into(),
                language: "en".into(),
                speed: 1.0,
                engine: "mock".into(),
                generated_at: Utc::now(),
                success: true,
                error: None,
                text_hash: "h".into(),
                subreddit: "rust".into(),
                title: "t".into(),
            };
            q.mark_outcome(&id, Outcome::Completed(artifact)).unwrap();
        }
        let removed = q.clear_completed().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(q.stats().total, 1);
        let _ = done;
    }

    #[test]
    fn score_derived_priority_bands() {
        assert_eq!(AudioQueue::priority_for_score(0), 1);
        assert_eq!(AudioQueue::priority_for_score(250), 2);
        assert_eq!(AudioQueue::priority_for_score(5000), 10);
    }
}
