//! Description cleanup: boilerplate truncation, script noise removal, and
//! whitespace normalization. Total over any input string.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Everything from the first of these markers onward is site boilerplate
/// (organizer blurbs, past-event listings, contact footers).
const BOILERPLATE_MARKERS: [&str; 3] = ["About", "Previous Events", "Contact"];

const MAX_DESCRIPTION_CHARS: usize = 1500;

static MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    BOILERPLATE_MARKERS
        .iter()
        .map(|marker| {
            RegexBuilder::new(&regex::escape(marker))
                .case_insensitive(true)
                .build()
                .expect("marker regex")
        })
        .collect()
});

static LATIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Latin}").expect("latin regex"));
static HAN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Han}+").expect("han regex"));
static NOISE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{S}+|[^\x00-\x7F]+").expect("noise regex"));
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize a raw event description. Never fails; absent or empty input
/// yields an empty string.
pub fn clean_description(text: Option<&str>) -> String {
    let raw = match text {
        Some(t) if !t.is_empty() => t,
        _ => return String::new(),
    };

    let mut text = raw.to_string();
    for marker in MARKERS.iter() {
        let cut = marker.find(&text).map(|found| found.start());
        if let Some(cut) = cut {
            text.truncate(cut);
        }
    }

    // Latin-containing text with embedded Han runs is a Latin-primary
    // description polluted with foreign boilerplate.
    if LATIN.is_match(&text) {
        text = HAN_RUNS.replace_all(&text, "").into_owned();
    }

    text = NOISE_RUNS.replace_all(&text, " ").into_owned();

    if text.chars().count() > MAX_DESCRIPTION_CHARS {
        text = text.chars().take(MAX_DESCRIPTION_CHARS).collect();
        text.push_str("...");
    }

    WHITESPACE_RUNS.replace_all(&text, " ").trim().to_string()
}
