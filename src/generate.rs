//! Audio generation orchestrator: composes the text pipeline, the safety
//! verdict, the narration engine, and artifact storage into one `generate`
//! call, plus the batch driver that drains the queue.
//!
//! Order matters and is fixed: idempotency check, adult-content gate,
//! normalization, numeric expansion, residual markup strip, safety
//! evaluation, synthesis, then the artifact write. A post flagged adult
//! never reaches the safety filter or the engine.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::engine::{NarrationEngine, SynthesisRequest};
use crate::error::NarratorError;
use crate::post::Post;
use crate::queue::{AudioQueue, Outcome};
use crate::storage::{audio_filename, text_hash, AudioArtifact, AudioStorage};
use crate::textproc::{self, safety, SafetyPolicy};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("generate_success_total", "Narrations generated successfully.");
        describe_counter!(
            "generate_filtered_total",
            "Generation attempts rejected by the safety policy."
        );
        describe_counter!("generate_failed_total", "Generation attempts that errored.");
    });
}

/// Per-call voice parameters. `force_regenerate` bypasses the idempotency
/// check and overwrites any existing artifact.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub voice: String,
    pub speed: f64,
    pub language: String,
    pub force_regenerate: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            voice: "en-US-Standard".into(),
            speed: 1.0,
            language: "en".into(),
            force_regenerate: false,
        }
    }
}

/// Result of one queue-draining pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BatchStats {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
}

pub struct AudioGenerator {
    engine: NarrationEngine,
    storage: Arc<AudioStorage>,
    policy: SafetyPolicy,
    engine_timeout: Duration,
}

impl AudioGenerator {
    pub fn new(
        engine: NarrationEngine,
        storage: Arc<AudioStorage>,
        policy: SafetyPolicy,
        engine_timeout: Duration,
    ) -> Self {
        ensure_metrics_described();
        Self {
            engine,
            storage,
            policy,
            engine_timeout,
        }
    }

    pub fn engine(&self) -> &NarrationEngine {
        &self.engine
    }

    pub fn storage(&self) -> &AudioStorage {
        &self.storage
    }

    /// Produce (or reuse) the narration artifact for one post.
    pub async fn generate(
        &self,
        post: &Post,
        options: &GenerateOptions,
    ) -> Result<AudioArtifact, NarratorError> {
        if !options.force_regenerate && self.storage.audio_exists(&post.id) {
            tracing::info!(post_id = %post.id, "audio already generated, reusing artifact");
            // audio_exists only holds when a record is present.
            return self
                .storage
                .get(&post.id)
                .ok_or_else(|| NarratorError::NotFound(post.id.clone()));
        }

        // Adult gate comes before any text processing at all.
        if self.policy.block_adult_content && post.is_adult_flagged {
            counter!("generate_filtered_total").increment(1);
            return Err(NarratorError::ContentFiltered {
                reason: "adult content".into(),
            });
        }

        // Residual markup comes off before the verdict: tags are not
        // narratable text and must not count toward the length minimum.
        let normalized = textproc::normalize_post(post);
        let expanded = textproc::expand_numerics(&normalized.narration_text);
        let stripped = textproc::strip_residual_markup(&expanded);
        let verdict = safety::evaluate(&stripped, &self.policy);
        if !verdict.safe {
            counter!("generate_filtered_total").increment(1);
            tracing::info!(
                post_id = %post.id,
                profanity_ratio = verdict.profanity_ratio,
                "content rejected by safety policy"
            );
            return Err(NarratorError::ContentFiltered {
                reason: verdict
                    .rejection_reason()
                    .unwrap_or_else(|| "rejected by safety policy".into()),
            });
        }
        let final_text = verdict.redacted_text;

        let request = SynthesisRequest {
            text: final_text.clone(),
            voice: options.voice.clone(),
            speed: options.speed,
            language: options.language.clone(),
        };
        let audio = match tokio::time::timeout(self.engine_timeout, self.engine.synthesize(&request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(NarratorError::Engine(format!(
                "synthesis timed out after {:?}",
                self.engine_timeout
            ))),
        };
        let audio = match audio {
            Ok(audio) => audio,
            Err(err) => {
                counter!("generate_failed_total").increment(1);
                // No record is written for a failed attempt: the previous
                // successful artifact (if any) stays authoritative.
                return Err(err);
            }
        };

        let now = Utc::now();
        let clean_title = textproc::strip_residual_markup(&normalized.title);
        let filename = audio_filename(post, &clean_title, now);
        let path = self.storage.write_audio(&filename, &audio.bytes)?;

        let artifact = AudioArtifact {
            post_id: post.id.clone(),
            file_path: path.display().to_string(),
            duration_seconds: audio.duration_seconds,
            file_size_bytes: audio.bytes.len() as u64,
            voice: options.voice.clone(),
            language: options.language.clone(),
            speed: options.speed,
            engine: self.engine.name().into(),
            generated_at: now,
            success: true,
            error: None,
            text_hash: text_hash(&final_text),
            subreddit: post.subreddit.clone(),
            title: clean_title,
        };
        self.storage.put(artifact.clone())?;

        counter!("generate_success_total").increment(1);
        tracing::info!(
            post_id = %post.id,
            file = %filename,
            duration = artifact.duration_seconds,
            "narration generated"
        );
        Ok(artifact)
    }
}

/// Drain up to `max_items` queued jobs through the generator. Per-item
/// failures are recorded on the item and never abort the batch. The queue
/// lock is released while synthesis runs.
pub async fn process_queue(
    queue: &Mutex<AudioQueue>,
    generator: &AudioGenerator,
    max_items: usize,
    options: &GenerateOptions,
) -> Result<BatchStats, NarratorError> {
    let claimed = queue
        .lock()
        .expect("queue mutex poisoned")
        .claim_pending(max_items)?;

    let mut stats = BatchStats::default();
    for item in claimed {
        stats.processed += 1;
        let outcome = match generator.generate(&item.post, options).await {
            Ok(artifact) => {
                stats.successful += 1;
                Outcome::Completed(artifact)
            }
            Err(err) => {
                stats.failed += 1;
                tracing::warn!(
                    queue_id = %item.id,
                    post_id = %item.post_id,
                    code = err.code(),
                    error = %err,
                    "queue item failed"
                );
                Outcome::Failed(err.to_string())
            }
        };
        queue
            .lock()
            .expect("queue mutex poisoned")
            .mark_outcome(&item.id, outcome)?;
    }

    tracing::info!(
        processed = stats.processed,
        successful = stats.successful,
        failed = stats.failed,
        "queue batch finished"
    );
    Ok(stats)
}
