//! Text normalizer: deterministic Reddit-markup-to-narration transform.
//!
//! Implemented as an ordered list of pure `&str -> String` stages. Order
//! matters: later stages assume the output shape of earlier ones (e.g. link
//! rewriting runs after markdown unwrapping so `[text](url)` is still
//! intact when it is matched). Every stage maps empty input to empty output,
//! and the whole pipeline is idempotent: running it on its own output is a
//! no-op.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::post::Post;
use crate::textproc::NormalizedText;

macro_rules! re {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pattern).expect("valid regex"));
    };
}

// Platform cliches: removal only, never substitution.
re!(RE_GOLD_THANKS, r"(?i)(Thanks for the gold|Thank you for the gold|Thanks kind stranger)[^.!]*[.!]?");
re!(RE_RIP_INBOX, r"(?i)(RIP (my )?inbox|inbox (is )?dead)[^.!]*[.!]?");
re!(RE_BLEW_UP, r"(?i)(This blew up|This got big|Wow this blew up)[^.!]*[.!]?");
re!(RE_THROWAWAY, r"(?i)(Throwaway account|Throwaway for obvious reasons)[^.!]*[.!]?");

// Lightweight markup.
re!(RE_STRIKETHROUGH, r"~~([^~]+)~~");
re!(RE_SPOILER, r">!([^!]+)!<");
re!(RE_QUOTE_MARKER, r"^>+\s*");
re!(RE_BOLD_STARS, r"\*{2,}([^*]+)\*{2,}");
re!(RE_ITALIC_STAR, r"\*([^*]+)\*");
re!(RE_BOLD_UNDERSCORE, r"_{2,}([^_]+)_{2,}");
re!(RE_ITALIC_UNDERSCORE, r"_([^_]+)_");

// Mentions. The slash-prefixed forms run first so the bare forms only see
// what is left.
re!(RE_USER_SLASH, r"(?i)/u/([\w-]+)");
re!(RE_USER_BARE, r"(?i)\bu/([\w-]+)");
re!(RE_SUB_SLASH, r"(?i)/r/([\w-]+)");
re!(RE_SUB_BARE, r"(?i)\br/([\w-]+)");

// Links. Named links keep their text; bare URLs are lossy by design.
re!(RE_NAMED_LINK, r"\[([^\]]+)\]\(([^)]+)\)");
re!(RE_URL, r"https?://[^\s)]+");
re!(RE_WWW_URL, r"www\.[^\s)]+");

// Edit markers and TL;DR.
re!(RE_EDIT_MARKER, r"(EDIT|Edit|UPDATE|Update)[ \t\d]*:");
re!(RE_TLDR, r"(?i)TL;?DR[ \t:]*");

// Bracketed demographic metadata, e.g. `[28M]`.
re!(RE_AGE_GENDER, r"\[(\d+)\s*([MFmf])\]");
re!(RE_REMOVED, r"\[removed\]|\[deleted\]|\[removed by moderator\]");

// Title punctuation.
re!(RE_REPEAT_TERMINAL, r"([!?])[!?]+$");

// Global cleanup.
re!(RE_ZERO_WIDTH, r"[\u{200B}\u{200C}\u{200D}\u{FEFF}]");
re!(RE_HSPACE, r"[ \t]+");
re!(RE_NL_PADDING, r"[ \t]*\n[ \t]*");
re!(RE_MANY_NEWLINES, r"\n{3,}");
re!(RE_SPACE_BEFORE_PUNCT, r" +([.,!?;:])");
re!(RE_PUNCT_NO_SPACE, r"([.!?,;])([A-Za-z])");

/// Clean one piece of Reddit text for narration.
///
/// Titles get an extra pass that tidies terminal punctuation; bodies keep
/// their paragraph breaks (capped at one blank line).
pub fn clean_text(text: &str, is_title: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = strip_cliches(text);
    out = strip_markup(&out);
    out = rewrite_mentions(&out);
    out = rewrite_links(&out);
    out = expand_abbreviations(&out);
    out = rewrite_bracket_metadata(&out);
    if is_title {
        out = tidy_title_punctuation(&out);
    }
    cleanup_whitespace(&out)
}

/// Normalize a full post: title, optional body, and the combined narration
/// text, plus human-readable notes about what changed.
pub fn normalize_post(post: &Post) -> NormalizedText {
    let title = clean_text(&post.title, true);

    let body_present = !is_absent_body(&post.body);
    let body = if body_present {
        clean_text(&post.body, false)
    } else {
        String::new()
    };

    let narration_text = if body.is_empty() {
        title.clone()
    } else if title.ends_with(['.', '!', '?']) {
        format!("{title} {body}")
    } else {
        format!("{title}. {body}")
    };

    let mut notes = Vec::new();
    if post.title.chars().count() != title.chars().count() {
        notes.push(format!(
            "Title cleaned ({} -> {} chars)",
            post.title.chars().count(),
            title.chars().count()
        ));
    }
    if body_present && post.body.chars().count() != body.chars().count() {
        notes.push(format!(
            "Body cleaned ({} -> {} chars)",
            post.body.chars().count(),
            body.chars().count()
        ));
    }
    if post.body.contains("[removed]") || post.body.contains("[deleted]") {
        notes.push("Removed/deleted content filtered".to_string());
    }

    let char_length = narration_text.chars().count();
    NormalizedText {
        title,
        body,
        narration_text,
        char_length,
        notes,
    }
}

/// A body that is empty or consists solely of deletion markers is absent.
fn is_absent_body(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || trimmed == "[removed]" || trimmed == "[deleted]"
}

fn strip_cliches(text: &str) -> String {
    let mut out = RE_GOLD_THANKS.replace_all(text, "").into_owned();
    out = RE_RIP_INBOX.replace_all(&out, "").into_owned();
    out = RE_BLEW_UP.replace_all(&out, "").into_owned();
    RE_THROWAWAY.replace_all(&out, "").into_owned()
}

fn strip_markup(text: &str) -> String {
    let mut out = RE_STRIKETHROUGH.replace_all(text, "$1").into_owned();
    out = RE_SPOILER.replace_all(&out, "$1").into_owned();

    // Block-quote markers go line by line, preserving the quoted content.
    out = out
        .split('\n')
        .map(|line| RE_QUOTE_MARKER.replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    out = RE_BOLD_STARS.replace_all(&out, "$1").into_owned();
    out = RE_ITALIC_STAR.replace_all(&out, "$1").into_owned();
    out = RE_BOLD_UNDERSCORE.replace_all(&out, "$1").into_owned();
    RE_ITALIC_UNDERSCORE.replace_all(&out, "$1").into_owned()
}

fn rewrite_mentions(text: &str) -> String {
    let mut out = RE_USER_SLASH.replace_all(text, "user $1").into_owned();
    out = RE_USER_BARE.replace_all(&out, "user $1").into_owned();
    out = RE_SUB_SLASH.replace_all(&out, "subreddit $1").into_owned();
    RE_SUB_BARE.replace_all(&out, "subreddit $1").into_owned()
}

fn rewrite_links(text: &str) -> String {
    let mut out = RE_NAMED_LINK.replace_all(text, "$1").into_owned();
    out = RE_URL.replace_all(&out, "link removed").into_owned();
    RE_WWW_URL.replace_all(&out, "link removed").into_owned()
}

static ABBREVIATIONS: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    let raw = include_str!("abbreviations.json");
    let map: BTreeMap<String, String> =
        serde_json::from_str(raw).expect("valid abbreviation dictionary");
    map.into_iter()
        .map(|(abbr, expansion)| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&abbr)))
                .expect("valid abbreviation regex");
            (re, expansion)
        })
        .collect()
});

/// Whole-word, case-insensitive dictionary expansion. Substring matches are
/// never rewritten, so unrelated words stay intact.
fn expand_abbreviations(text: &str) -> String {
    let mut out = text.to_string();
    for (re, expansion) in ABBREVIATIONS.iter() {
        out = re.replace_all(&out, expansion.as_str()).into_owned();
    }
    out
}

fn rewrite_bracket_metadata(text: &str) -> String {
    let out = RE_AGE_GENDER.replace_all(text, |caps: &regex::Captures| {
        let age = &caps[1];
        let gender = if caps[2].eq_ignore_ascii_case("m") {
            "male"
        } else {
            "female"
        };
        format!("{age} year old {gender}")
    });
    RE_REMOVED.replace_all(&out, "").into_owned()
}

/// Title-only: collapse `!!!`/`???` runs to the first mark, then make sure
/// the title ends with sentence punctuation.
fn tidy_title_punctuation(text: &str) -> String {
    let mut out = RE_REPEAT_TERMINAL.replace(text.trim_end(), "$1").into_owned();
    if let Some(last) = out.chars().last() {
        if !matches!(last, '.' | '!' | '?') {
            out.push('.');
        }
    }
    out
}

fn cleanup_whitespace(text: &str) -> String {
    let mut out = RE_ZERO_WIDTH.replace_all(text, "").into_owned();

    // Edit/TLDR markers become their own paragraph with a uniform label.
    out = RE_EDIT_MARKER.replace_all(&out, "\n\nEdit:").into_owned();
    out = RE_TLDR
        .replace_all(&out, "\n\nToo long, didn't read: ")
        .into_owned();

    out = RE_HSPACE.replace_all(&out, " ").into_owned();
    out = RE_NL_PADDING.replace_all(&out, "\n").into_owned();
    out = RE_MANY_NEWLINES.replace_all(&out, "\n\n").into_owned();
    out = RE_SPACE_BEFORE_PUNCT.replace_all(&out, "$1").into_owned();
    out = RE_PUNCT_NO_SPACE.replace_all(&out, "$1 $2").into_owned();
    out.trim().to_string()
}
