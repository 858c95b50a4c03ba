//! Text transformation pipeline: normalization, numeric expansion, and
//! content safety, composed in fixed order by the audio generator.

pub mod normalize;
pub mod numeric;
pub mod safety;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub use normalize::{clean_text, normalize_post};
pub use numeric::expand_numerics;
pub use safety::{RejectionCause, SafetyPolicy, SafetyVerdict};

/// Narration-ready text derived from a post. Never mutates the source.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedText {
    pub title: String,
    pub body: String,
    /// Combined `title + body` narration string.
    pub narration_text: String,
    pub char_length: usize,
    /// Human-readable descriptions of what changed during normalization.
    pub notes: Vec<String>,
}

/// Strip any residual SSML/XML-style tags the narration engine cannot
/// consume, and re-collapse the whitespace that leaves behind.
pub fn strip_residual_markup(text: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
    let out = RE_TAGS.replace_all(text, "");
    RE_WS.replace_all(&out, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residual_tags_are_stripped() {
        let out = strip_residual_markup(r#"Hello <break time="0.5s"/> world"#);
        assert_eq!(out, "Hello world");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(strip_residual_markup("just words"), "just words");
    }
}
