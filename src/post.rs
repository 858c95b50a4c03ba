//! Immutable source record for a fetched Reddit post.
//!
//! `id` is stable per source and is the dedup/idempotency key everywhere
//! downstream (queue, metadata store, artifact lookup). A `Post` is never
//! mutated after fetch; derived text lives in `NormalizedText`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    /// Self-text body; empty for link/image posts.
    #[serde(default)]
    pub body: String,
    #[serde(default = "deleted_author")]
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_self_text: bool,
    #[serde(default)]
    pub is_video: bool,
    /// Reddit's `over_18` flag.
    #[serde(default)]
    pub is_adult_flagged: bool,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: String,
}

fn deleted_author() -> String {
    "[deleted]".to_string()
}

impl Post {
    /// Total content length considered for narration (title + body).
    pub fn content_length(&self) -> usize {
        self.title.chars().count() + self.body.chars().count()
    }

    /// Whether the body carries any text at all.
    pub fn has_text_content(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Rough narration duration estimate: 5 chars per word, 150 words/minute.
    pub fn estimated_duration_secs(&self) -> f64 {
        let words = self.content_length() as f64 / 5.0;
        words / 150.0 * 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample(id: &str) -> Post {
        Post {
            id: id.to_string(),
            title: "A title".into(),
            body: "Some body text".into(),
            author: "author".into(),
            subreddit: "rust".into(),
            score: 100,
            comment_count: 5,
            created_at: Utc::now(),
            is_self_text: true,
            is_video: false,
            is_adult_flagged: false,
            permalink: "/r/rust/comments/x".into(),
            url: "https://reddit.com/r/rust/comments/x".into(),
        }
    }

    #[test]
    fn content_length_counts_title_and_body() {
        let p = sample("abc");
        assert_eq!(p.content_length(), "A title".len() + "Some body text".len());
    }

    #[test]
    fn missing_author_defaults_to_deleted() {
        let json = r#"{
            "id": "x1", "title": "t", "subreddit": "rust",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let p: Post = serde_json::from_str(json).unwrap();
        assert_eq!(p.author, "[deleted]");
        assert_eq!(p.score, 0);
    }
}
