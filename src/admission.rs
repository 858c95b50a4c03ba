//! Post admission filter: decides which fetched posts enter the pipeline.
//!
//! Predicates run cheapest-first and short-circuit on the first failure, so
//! each excluded post carries exactly one exclusion reason. The reason
//! histogram plus the accepted count always sums to the input count.
//! Filtering is opt-in: a config with no active filters accepts everything.

use std::collections::BTreeMap;

use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::NarratorError;
use crate::post::Post;

/// Default character threshold under which a body is not "meaningful text".
pub const DEFAULT_MEANINGFUL_TEXT_THRESHOLD: usize = 50;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("admission_accepted_total", "Posts accepted by the admission filter.");
        describe_counter!("admission_excluded_total", "Posts excluded, labeled by reason.");
    });
}

/// Filter configuration. All filters are optional; construction validates
/// the parameters and never silently corrects them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    pub min_score: Option<i64>,
    pub min_char_count: Option<usize>,
    pub max_char_count: Option<usize>,
    #[serde(default)]
    pub exclude_adult: bool,
    #[serde(default)]
    pub exclude_deleted_removed: bool,
    #[serde(default)]
    pub exclude_image_only: bool,
    #[serde(default)]
    pub exclude_link_only: bool,
    #[serde(default = "default_threshold")]
    pub meaningful_text_threshold: usize,
}

fn default_threshold() -> usize {
    DEFAULT_MEANINGFUL_TEXT_THRESHOLD
}

impl FilterConfig {
    /// Validate a config, rejecting contradictory bounds.
    pub fn validated(self) -> Result<Self, NarratorError> {
        if let (Some(min), Some(max)) = (self.min_char_count, self.max_char_count) {
            if max < min {
                return Err(NarratorError::Validation(format!(
                    "max_char_count ({max}) must be >= min_char_count ({min})"
                )));
            }
        }
        if let Some(max) = self.max_char_count {
            if max < 1 {
                return Err(NarratorError::Validation(
                    "max_char_count must be >= 1".into(),
                ));
            }
        }
        if let Some(min) = self.min_score {
            if min < 0 {
                return Err(NarratorError::Validation(format!(
                    "min_score must be >= 0, got {min}"
                )));
            }
        }
        Ok(self)
    }

    /// Whether at least one predicate is active.
    pub fn has_any_filters(&self) -> bool {
        self.min_score.is_some()
            || self.min_char_count.is_some()
            || self.max_char_count.is_some()
            || self.exclude_adult
            || self.exclude_deleted_removed
            || self.exclude_image_only
            || self.exclude_link_only
    }

    fn has_length_filters(&self) -> bool {
        self.min_char_count.is_some()
            || self.max_char_count.is_some()
            || self.exclude_image_only
            || self.exclude_link_only
    }
}

/// Why a post was excluded. Serialized snake_case for API histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MinScore,
    AdultContent,
    DeletedRemoved,
    MinCharCount,
    MaxCharCount,
    ImageOnly,
    LinkOnly,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::MinScore => "min_score",
            ExclusionReason::AdultContent => "adult_content",
            ExclusionReason::DeletedRemoved => "deleted_removed",
            ExclusionReason::MinCharCount => "min_char_count",
            ExclusionReason::MaxCharCount => "max_char_count",
            ExclusionReason::ImageOnly => "image_only",
            ExclusionReason::LinkOnly => "link_only",
        }
    }
}

/// Result of running the admission filter over a batch.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionOutcome {
    pub accepted: Vec<Post>,
    pub reasons: BTreeMap<ExclusionReason, usize>,
    pub total_fetched: usize,
    pub filters_applied: bool,
}

/// Evaluate each post against the active predicates, cheapest first.
pub fn admit(posts: Vec<Post>, config: &FilterConfig) -> AdmissionOutcome {
    ensure_metrics_described();

    let total_fetched = posts.len();
    let filters_applied = config.has_any_filters();

    if !filters_applied {
        counter!("admission_accepted_total").increment(total_fetched as u64);
        return AdmissionOutcome {
            accepted: posts,
            reasons: BTreeMap::new(),
            total_fetched,
            filters_applied,
        };
    }

    let mut accepted = Vec::with_capacity(posts.len());
    let mut reasons: BTreeMap<ExclusionReason, usize> = BTreeMap::new();

    for post in posts {
        match first_failed_predicate(&post, config) {
            Some(reason) => {
                counter!("admission_excluded_total", "reason" => reason.as_str()).increment(1);
                *reasons.entry(reason).or_insert(0) += 1;
            }
            None => accepted.push(post),
        }
    }

    counter!("admission_accepted_total").increment(accepted.len() as u64);
    tracing::info!(
        total = total_fetched,
        accepted = accepted.len(),
        excluded = total_fetched - accepted.len(),
        "admission filter pass complete"
    );

    AdmissionOutcome {
        accepted,
        reasons,
        total_fetched,
        filters_applied,
    }
}

fn first_failed_predicate(post: &Post, config: &FilterConfig) -> Option<ExclusionReason> {
    if let Some(min) = config.min_score {
        if post.score < min {
            return Some(ExclusionReason::MinScore);
        }
    }

    if config.exclude_adult && post.is_adult_flagged {
        return Some(ExclusionReason::AdultContent);
    }

    if config.exclude_deleted_removed && has_deletion_markers(post) {
        return Some(ExclusionReason::DeletedRemoved);
    }

    // Length/meaningful-text predicates share one length computation and
    // only run when any of them is configured.
    if config.has_length_filters() {
        let text_length = post.content_length();

        if let Some(min) = config.min_char_count {
            if text_length < min {
                return Some(ExclusionReason::MinCharCount);
            }
        }
        if let Some(max) = config.max_char_count {
            if text_length > max {
                return Some(ExclusionReason::MaxCharCount);
            }
        }

        let threshold = config.meaningful_text_threshold;
        if config.exclude_image_only
            && !post.is_self_text
            && !post.is_video
            && meaningful_text_length(&post.body) < threshold
        {
            return Some(ExclusionReason::ImageOnly);
        }
        if config.exclude_link_only
            && !post.is_self_text
            && meaningful_text_length(&post.body) < threshold
        {
            return Some(ExclusionReason::LinkOnly);
        }
    }

    None
}

fn has_deletion_markers(post: &Post) -> bool {
    let body = post.body.as_str();
    body.contains("[removed]")
        || body.contains("[deleted]")
        || post.title.contains("[removed]")
        || post.title.contains("[deleted]")
        || post.author == "[deleted]"
}

/// Character count of a body after discarding URLs and collapsing whitespace.
/// A wall of links counts as zero meaningful text.
pub fn meaningful_text_length(body: &str) -> usize {
    static RE_URL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url regex"));
    let stripped = RE_URL.replace_all(body, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ").chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: &str, score: i64) -> Post {
        Post {
            id: id.into(),
            title: "A reasonable title".into(),
            body: "Some body text that is long enough to count as meaningful content here.".into(),
            author: "someone".into(),
            subreddit: "rust".into(),
            score,
            comment_count: 0,
            created_at: Utc::now(),
            is_self_text: true,
            is_video: false,
            is_adult_flagged: false,
            permalink: String::new(),
            url: String::new(),
        }
    }

    #[test]
    fn no_filters_accepts_everything() {
        let out = admit(vec![post("a", 0), post("b", -5)], &FilterConfig::default());
        assert_eq!(out.accepted.len(), 2);
        assert!(out.reasons.is_empty());
        assert!(!out.filters_applied);
    }

    #[test]
    fn min_score_short_circuits_before_adult() {
        let mut p = post("a", 1);
        p.is_adult_flagged = true;
        let cfg = FilterConfig {
            min_score: Some(10),
            exclude_adult: true,
            ..Default::default()
        };
        let out = admit(vec![p], &cfg);
        assert_eq!(out.reasons.get(&ExclusionReason::MinScore), Some(&1));
        assert_eq!(out.reasons.get(&ExclusionReason::AdultContent), None);
    }

    #[test]
    fn deleted_author_is_excluded() {
        let mut p = post("a", 50);
        p.author = "[deleted]".into();
        let cfg = FilterConfig {
            exclude_deleted_removed: true,
            ..Default::default()
        };
        let out = admit(vec![p], &cfg);
        assert_eq!(out.reasons.get(&ExclusionReason::DeletedRemoved), Some(&1));
    }

    #[test]
    fn link_only_body_has_no_meaningful_text() {
        assert_eq!(meaningful_text_length("https://a.example/x www.b.example/y"), 0);
        assert!(meaningful_text_length("see https://a.example but also real words") > 0);
    }

    #[test]
    fn validation_rejects_inverted_bounds() {
        let err = FilterConfig {
            min_char_count: Some(100),
            max_char_count: Some(50),
            ..Default::default()
        }
        .validated()
        .unwrap_err();
        assert!(matches!(err, NarratorError::Validation(_)));
    }
}
