//! Audio artifact storage: bytes on disk under a configured root, plus a
//! read-all/write-all JSON metadata document keyed by post id.
//!
//! The metadata document is the second shared mutable resource besides the
//! queue snapshot; both follow the same single-writer discipline, and every
//! write goes through a temp-file-then-rename so a crash never leaves a
//! truncated document.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::NarratorError;
use crate::post::Post;

/// Persisted record of one generated (or attempted) narration.
/// At most one current artifact per post; regeneration overwrites the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub post_id: String,
    pub file_path: String,
    pub duration_seconds: f64,
    pub file_size_bytes: u64,
    pub voice: String,
    pub language: String,
    pub speed: f64,
    pub engine: String,
    pub generated_at: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Content hash of the final narration text, for future dedup.
    pub text_hash: String,
    pub subreddit: String,
    pub title: String,
}

/// Short hex prefix of the sha256 of the narration text.
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Filesystem-backed artifact store: audio files under `audio_dir`, metadata
/// in a single JSON document next to them.
pub struct AudioStorage {
    audio_dir: PathBuf,
    metadata_path: PathBuf,
    metadata: Mutex<HashMap<String, AudioArtifact>>,
}

impl AudioStorage {
    pub fn open(audio_dir: impl Into<PathBuf>) -> Result<Self, NarratorError> {
        let audio_dir = audio_dir.into();
        fs::create_dir_all(&audio_dir)
            .map_err(|e| NarratorError::Storage(format!("creating {}: {e}", audio_dir.display())))?;
        let metadata_path = audio_dir.join("audio_metadata.json");
        let metadata = load_document(&metadata_path)?;
        tracing::info!(
            dir = %audio_dir.display(),
            records = metadata.len(),
            "audio storage opened"
        );
        Ok(Self {
            audio_dir,
            metadata_path,
            metadata: Mutex::new(metadata),
        })
    }

    /// Current artifact record for a post, if any.
    pub fn get(&self, post_id: &str) -> Option<AudioArtifact> {
        self.metadata.lock().expect("metadata mutex poisoned").get(post_id).cloned()
    }

    /// Whether a successful artifact exists for the post *and* its file is
    /// still on disk. The idempotency check for generation.
    pub fn audio_exists(&self, post_id: &str) -> bool {
        match self.get(post_id) {
            Some(a) => a.success && Path::new(&a.file_path).exists(),
            None => false,
        }
    }

    /// Store an artifact record, persisting the whole document immediately.
    pub fn put(&self, artifact: AudioArtifact) -> Result<(), NarratorError> {
        let mut map = self.metadata.lock().expect("metadata mutex poisoned");
        map.insert(artifact.post_id.clone(), artifact);
        save_document(&self.metadata_path, &map)
    }

    /// Write audio bytes under the storage root, returning the full path.
    pub fn write_audio(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, NarratorError> {
        let path = self.audio_dir.join(filename);
        fs::write(&path, bytes)
            .map_err(|e| NarratorError::Storage(format!("writing {}: {e}", path.display())))?;
        Ok(path)
    }

    /// Aggregate view over successful artifacts.
    pub fn stats(&self) -> StorageStats {
        let map = self.metadata.lock().expect("metadata mutex poisoned");
        let mut stats = StorageStats::default();
        for artifact in map.values().filter(|a| a.success) {
            stats.total_files += 1;
            stats.total_duration_seconds += artifact.duration_seconds;
            stats.total_size_bytes += artifact.file_size_bytes;
            *stats.by_subreddit.entry(artifact.subreddit.clone()).or_insert(0) += 1;
            *stats.by_engine.entry(artifact.engine.clone()).or_insert(0) += 1;
        }
        stats
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    pub total_files: usize,
    pub total_duration_seconds: f64,
    pub total_size_bytes: u64,
    pub by_subreddit: std::collections::BTreeMap<String, usize>,
    pub by_engine: std::collections::BTreeMap<String, usize>,
}

/// Deterministic audio filename: `{subreddit}_{title-slug}_{timestamp}.mp3`.
pub fn audio_filename(post: &Post, clean_title: &str, now: DateTime<Utc>) -> String {
    let slug: String = clean_title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .take(30)
        .collect::<String>()
        .trim()
        .replace(' ', "_");
    format!(
        "{}_{}_{}.mp3",
        post.subreddit.to_lowercase(),
        slug.to_lowercase(),
        now.format("%Y%m%d_%H%M%S")
    )
}

fn load_document(path: &Path) -> Result<HashMap<String, AudioArtifact>, NarratorError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| NarratorError::Storage(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| NarratorError::Storage(format!("parsing {}: {e}", path.display())))
}

/// Whole-document write through a temp file + atomic rename.
pub(crate) fn save_json_atomically<T: Serialize>(path: &Path, value: &T) -> Result<(), NarratorError> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|e| NarratorError::Storage(format!("serializing {}: {e}", path.display())))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, raw)
        .map_err(|e| NarratorError::Storage(format!("writing {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| NarratorError::Storage(format!("renaming {}: {e}", path.display())))
}

fn save_document(path: &Path, map: &HashMap<String, AudioArtifact>) -> Result<(), NarratorError> {
    save_json_atomically(path, map)
}
