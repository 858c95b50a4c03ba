//! Content safety filter: profanity redaction, sensitive-topic tagging, and
//! the accept/reject verdict.
//!
//! Pure function over (text, policy); rejection is a normal outcome, never
//! an error. The adult-content short-circuit is a post-level decision and is
//! applied by the caller before any text reaches this filter.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Profanity ratio above which (strictly) text is rejected.
pub const MAX_PROFANITY_RATIO: f32 = 0.30;
/// Minimum character count (trimmed) for narratable text.
pub const MIN_NARRATION_CHARS: usize = 10;

const BLEEP_MARKER: &str = "[bleep]";

/// Patterns tolerate letter-repetition obfuscation ("fuuuck") and are
/// anchored on word boundaries.
static PROFANITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bf+u+c+k+\w*\b",
        r"(?i)\bs+h+i+t+\w*\b",
        r"(?i)\ba+s+s+h+o+l+e+\w*\b",
        r"(?i)\bb+i+t+c+h+\w*\b",
        r"(?i)\bd+a+m+n+\w*\b",
        r"(?i)\bh+e+l+l+\b",
        r"(?i)\bc+r+a+p+\w*\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid profanity pattern"))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CensorStyle {
    /// Keep first/last character, mask the interior; words of length <= 2
    /// are fully masked.
    #[default]
    Asterisk,
    /// Delete the match outright.
    Remove,
    /// Replace with a fixed marker token.
    BleepTag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub redact_profanity: bool,
    pub block_adult_content: bool,
    pub censor_style: CensorStyle,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            redact_profanity: true,
            block_adult_content: true,
            censor_style: CensorStyle::Asterisk,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveTopic {
    Violence,
    SelfHarm,
    Substance,
    Medical,
    Trauma,
}

const TOPIC_KEYWORDS: &[(SensitiveTopic, &[&str])] = &[
    (SensitiveTopic::Violence, &["murder", "kill", "assault", "attack", "violent"]),
    (SensitiveTopic::SelfHarm, &["suicide", "self harm", "self-harm", "cutting"]),
    (SensitiveTopic::Substance, &["drug", "alcohol", "drunk", "overdose"]),
    (SensitiveTopic::Medical, &["cancer", "disease", "terminal", "diagnosis"]),
    (SensitiveTopic::Trauma, &["abuse", "trauma", "ptsd", "rape"]),
];

/// Why a verdict rejected the text. Checked in this order; the first
/// matching cause wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCause {
    DeletionMarker,
    TooShort,
    ProfanityRatio,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafetyVerdict {
    pub redacted_text: String,
    pub topics: BTreeSet<SensitiveTopic>,
    pub profanity_count: usize,
    pub profanity_ratio: f32,
    pub rejection: Option<RejectionCause>,
    pub safe: bool,
}

impl SafetyVerdict {
    /// Human-readable rejection reason, `None` when the text is safe.
    pub fn rejection_reason(&self) -> Option<String> {
        self.rejection.map(|cause| match cause {
            RejectionCause::DeletionMarker => "text contains deletion markers".to_string(),
            RejectionCause::TooShort => {
                format!("narration text under {MIN_NARRATION_CHARS} characters")
            }
            RejectionCause::ProfanityRatio => format!(
                "profanity ratio {:.2} above {:.2}",
                self.profanity_ratio, MAX_PROFANITY_RATIO
            ),
        })
    }
}

/// Scan, redact, tag, and decide. Word count comes from the input text so
/// the ratio is not skewed by removal-style censoring.
pub fn evaluate(text: &str, policy: &SafetyPolicy) -> SafetyVerdict {
    let profanity_count: usize = PROFANITY_PATTERNS
        .iter()
        .map(|re| re.find_iter(text).count())
        .sum();

    let redacted_text = if policy.redact_profanity && profanity_count > 0 {
        redact(text, policy.censor_style)
    } else {
        text.to_string()
    };

    let topics = detect_topics(text);

    let word_count = text.split_whitespace().count();
    let profanity_ratio = if word_count == 0 {
        0.0
    } else {
        profanity_count as f32 / word_count as f32
    };

    let stripped_len = redacted_text.trim().chars().count();
    let has_deletion_marker =
        redacted_text.contains("[removed]") || redacted_text.contains("[deleted]");

    let rejection = if has_deletion_marker {
        Some(RejectionCause::DeletionMarker)
    } else if stripped_len < MIN_NARRATION_CHARS {
        Some(RejectionCause::TooShort)
    } else if profanity_ratio > MAX_PROFANITY_RATIO {
        Some(RejectionCause::ProfanityRatio)
    } else {
        None
    };
    let safe = rejection.is_none();

    if let Some(cause) = rejection {
        tracing::debug!(
            ?cause,
            profanity_ratio,
            stripped_len,
            "text rejected by safety filter"
        );
    }

    SafetyVerdict {
        redacted_text,
        topics,
        profanity_count,
        profanity_ratio,
        rejection,
        safe,
    }
}

fn redact(text: &str, style: CensorStyle) -> String {
    let mut out = text.to_string();
    for re in PROFANITY_PATTERNS.iter() {
        out = re
            .replace_all(&out, |caps: &regex::Captures| censor_word(&caps[0], style))
            .into_owned();
    }
    if style == CensorStyle::Remove {
        // Deletion leaves double spaces behind.
        static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"  +").expect("valid regex"));
        out = RE_SPACES.replace_all(&out, " ").trim().to_string();
    }
    out
}

fn censor_word(word: &str, style: CensorStyle) -> String {
    match style {
        CensorStyle::Remove => String::new(),
        CensorStyle::BleepTag => BLEEP_MARKER.to_string(),
        CensorStyle::Asterisk => {
            let chars: Vec<char> = word.chars().collect();
            if chars.len() <= 2 {
                "*".repeat(chars.len())
            } else {
                let mut masked = String::with_capacity(chars.len());
                masked.push(chars[0]);
                masked.push_str(&"*".repeat(chars.len() - 2));
                masked.push(chars[chars.len() - 1]);
                masked
            }
        }
    }
}

/// Each matching category is recorded once, by keyword membership.
fn detect_topics(text: &str) -> BTreeSet<SensitiveTopic> {
    let lower = text.to_lowercase();
    let mut topics = BTreeSet::new();
    for (topic, keywords) in TOPIC_KEYWORDS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            topics.insert(*topic);
        }
    }
    topics
}
