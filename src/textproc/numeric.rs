//! Numeric/unit expander: turns currency, percentages, clock times,
//! ordinals, and comma-grouped integers into speakable words, then
//! substitutes symbols and emoji.
//!
//! Patterns run innermost-first in a fixed priority order, and each
//! `replace_all` pass never re-scans its own replacements, so already
//! expanded text is a fixed point. Unknown or malformed numeric tokens pass
//! through unchanged; this stage must never fail.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

macro_rules! re {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pattern).expect("valid regex"));
    };
}

re!(RE_CURRENCY, r"\$(\d+(?:,\d{3})*)(?:\.(\d{2}))?");
re!(RE_PERCENT, r"(\d+(?:\.\d+)?)\s?%");
re!(RE_TIME_12H, r"(?i)\b(\d{1,2}):(\d{2})\s*([ap])\.?m\.?");
re!(RE_ORDINAL, r"(?i)\b(\d+)(st|nd|rd|th)\b");
re!(RE_GROUPED_INT, r"\b\d{1,3}(?:,\d{3})+\b");
re!(RE_NON_ASCII, r"[^\x00-\x7F]+");
re!(RE_MULTI_SPACE, r"  +");
re!(RE_SPACE_BEFORE_PUNCT, r" +([.,!?;:])");

/// Symbol-to-word substitutions applied after the numeric patterns, so a
/// literal `%` left over from a malformed token still reads as a word.
const SYMBOL_WORDS: &[(&str, &str)] = &[
    ("&", " and "),
    ("@", " at "),
    ("#", " hashtag "),
    ("%", " percent "),
    ("+", " plus "),
    ("=", " equals "),
    ("÷", " divided by "),
    ("×", " times "),
    ("°", " degrees "),
    ("™", " trademark "),
    ("©", " copyright "),
    ("®", " registered "),
    ("…", "... "),
    ("—", ", "),
    ("–", " to "),
];

static EMOJI_WORDS: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    let raw = include_str!("emoji.json");
    serde_json::from_str(raw).expect("valid emoji dictionary")
});

/// Expand all speakable patterns in `text`. Pure, never fails.
pub fn expand_numerics(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = RE_CURRENCY
        .replace_all(text, |caps: &Captures| expand_currency(caps))
        .into_owned();

    out = RE_PERCENT
        .replace_all(&out, |caps: &Captures| {
            format!("{} percent", decimal_to_words(&caps[1]))
        })
        .into_owned();

    out = RE_TIME_12H
        .replace_all(&out, |caps: &Captures| expand_time(caps))
        .into_owned();

    out = RE_ORDINAL
        .replace_all(&out, |caps: &Captures| match caps[1].parse::<u64>() {
            Ok(n) => ordinal_to_words(n),
            Err(_) => caps[0].to_string(),
        })
        .into_owned();

    out = RE_GROUPED_INT
        .replace_all(&out, |caps: &Captures| {
            let digits = caps[0].replace(',', "");
            match digits.parse::<u64>() {
                Ok(n) => number_to_words(n),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned();

    for (symbol, word) in SYMBOL_WORDS {
        if out.contains(symbol) {
            out = out.replace(symbol, word);
        }
    }

    for (emoji, description) in EMOJI_WORDS.iter() {
        if out.contains(emoji.as_str()) {
            out = out.replace(emoji.as_str(), &format!(" {description} "));
        }
    }

    // Anything still outside ASCII has no speakable mapping; drop it.
    out = RE_NON_ASCII.replace_all(&out, "").into_owned();

    out = RE_MULTI_SPACE.replace_all(&out, " ").into_owned();
    out = RE_SPACE_BEFORE_PUNCT.replace_all(&out, "$1").into_owned();
    out.trim().to_string()
}

fn expand_currency(caps: &Captures) -> String {
    let dollars = caps[1].replace(',', "");
    let Ok(whole) = dollars.parse::<u64>() else {
        return caps[0].to_string();
    };
    let unit = if whole == 1 { "dollar" } else { "dollars" };
    let mut out = format!("{} {unit}", number_to_words(whole));
    if let Some(cents) = caps.get(2) {
        if let Ok(c) = cents.as_str().parse::<u64>() {
            if c > 0 {
                let cent_unit = if c == 1 { "cent" } else { "cents" };
                out.push_str(&format!(" and {} {cent_unit}", number_to_words(c)));
            }
        }
    }
    out
}

fn expand_time(caps: &Captures) -> String {
    let Ok(hour) = caps[1].parse::<u64>() else {
        return caps[0].to_string();
    };
    let minute_str = &caps[2];
    let Ok(minute) = minute_str.parse::<u64>() else {
        return caps[0].to_string();
    };
    let period = if caps[3].eq_ignore_ascii_case("a") {
        "a m"
    } else {
        "p m"
    };

    if minute == 0 {
        format!("{} {period}", number_to_words(hour))
    } else if minute < 10 {
        format!("{} oh {} {period}", number_to_words(hour), number_to_words(minute))
    } else {
        format!("{} {} {period}", number_to_words(hour), number_to_words(minute))
    }
}

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// English words for a non-negative integer up to the billions.
pub fn number_to_words(n: u64) -> String {
    if n < 20 {
        return ONES[n as usize].to_string();
    }
    if n < 100 {
        let tens = TENS[(n / 10) as usize];
        return if n % 10 == 0 {
            tens.to_string()
        } else {
            format!("{tens} {}", ONES[(n % 10) as usize])
        };
    }
    if n < 1_000 {
        return compound(n, 100, "hundred");
    }
    if n < 1_000_000 {
        return compound(n, 1_000, "thousand");
    }
    if n < 1_000_000_000 {
        return compound(n, 1_000_000, "million");
    }
    compound(n, 1_000_000_000, "billion")
}

fn compound(n: u64, base: u64, unit: &str) -> String {
    let head = format!("{} {unit}", number_to_words(n / base));
    if n % base == 0 {
        head
    } else {
        format!("{head} {}", number_to_words(n % base))
    }
}

/// Words for a decimal string like `3.5` -> "three point five".
fn decimal_to_words(s: &str) -> String {
    match s.split_once('.') {
        None => s.parse::<u64>().map(number_to_words).unwrap_or_else(|_| s.to_string()),
        Some((whole, frac)) => {
            let Ok(w) = whole.parse::<u64>() else {
                return s.to_string();
            };
            let digits: Vec<&str> = frac
                .chars()
                .filter_map(|c| c.to_digit(10).map(|d| ONES[d as usize]))
                .collect();
            format!("{} point {}", number_to_words(w), digits.join(" "))
        }
    }
}

/// English ordinal words: 1 -> "first", 22 -> "twenty second".
pub fn ordinal_to_words(n: u64) -> String {
    let cardinal = number_to_words(n);
    let mut words: Vec<&str> = cardinal.split(' ').collect();
    let last = words.pop().unwrap_or("zero");
    let ordinal_last = match last {
        "zero" => "zeroth".to_string(),
        "one" => "first".to_string(),
        "two" => "second".to_string(),
        "three" => "third".to_string(),
        "five" => "fifth".to_string(),
        "eight" => "eighth".to_string(),
        "nine" => "ninth".to_string(),
        "twelve" => "twelfth".to_string(),
        w if w.ends_with('y') => format!("{}ieth", &w[..w.len() - 1]),
        w => format!("{w}th"),
    };
    words.push(&ordinal_last);
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_expands_to_dollars() {
        let out = expand_numerics("It cost $50 total");
        assert!(out.contains("fifty dollars"), "{out}");
        assert_eq!(expand_numerics("$1"), "one dollar");
        assert_eq!(expand_numerics("$5.99"), "five dollars and ninety nine cents");
        assert_eq!(expand_numerics("$1,500"), "one thousand five hundred dollars");
    }

    #[test]
    fn percent_expands() {
        assert_eq!(expand_numerics("25%"), "twenty five percent");
        assert_eq!(expand_numerics("3.5%"), "three point five percent");
    }

    #[test]
    fn twelve_hour_times_expand_hour_and_minute() {
        let out = expand_numerics("at 3:30 PM sharp");
        assert!(out.contains("three"), "{out}");
        assert!(out.contains("thirty"), "{out}");
        assert_eq!(expand_numerics("9:00 am"), "nine a m");
        assert_eq!(expand_numerics("9:05 am"), "nine oh five a m");
    }

    #[test]
    fn ordinals_expand() {
        assert_eq!(expand_numerics("1st"), "first");
        assert_eq!(expand_numerics("2nd"), "second");
        assert_eq!(expand_numerics("3rd place"), "third place");
        assert_eq!(expand_numerics("22nd"), "twenty second");
        assert_eq!(expand_numerics("20th"), "twentieth");
        assert_eq!(expand_numerics("100th"), "one hundredth");
    }

    #[test]
    fn grouped_integers_expand() {
        assert_eq!(expand_numerics("1,000"), "one thousand");
        assert_eq!(
            expand_numerics("2,500,000 views"),
            "two million five hundred thousand views"
        );
    }

    #[test]
    fn ungrouped_integers_pass_through() {
        assert_eq!(expand_numerics("version 42 shipped"), "version 42 shipped");
    }

    #[test]
    fn symbols_become_words() {
        let out = expand_numerics("cats & dogs @ home");
        assert_eq!(out, "cats and dogs at home");
    }

    #[test]
    fn emoji_get_descriptions_and_leftovers_are_dropped() {
        assert_eq!(expand_numerics("nice 🔥"), "nice fire");
        // Unmapped non-ASCII is deleted outright.
        assert_eq!(expand_numerics("café"), "caf");
    }

    #[test]
    fn expander_is_idempotent_over_its_own_output() {
        let samples = ["$50 at 3:30 PM, 1st of 1,000,000", "25% & more 🔥"];
        for s in samples {
            let once = expand_numerics(s);
            assert_eq!(expand_numerics(&once), once, "not a fixed point for {s:?}");
        }
    }

    #[test]
    fn malformed_tokens_pass_through() {
        assert_eq!(expand_numerics("$ 50"), "$ 50");
        assert_eq!(expand_numerics("12:xx pm"), "12:xx pm");
    }
}
