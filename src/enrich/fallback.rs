use std::sync::OnceLock;

use regex::Regex;

use crate::store::UNCATEGORIZED;

pub const MAX_TAGS: usize = 5;
const LAST_RESORT_TAG: &str = "misc";

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "with", "from", "to", "of", "in", "on",
    "for", "is", "at", "by", "as", "podcast", "podcasts", "show", "episode", "episodes",
];

fn category_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[&/,\s]+").expect("static regex"))
}

fn word_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static regex"))
}

/// Deterministic tags for a record the backend could not tag.
/// Category tokens come first, then title tokens; never empty.
pub fn synthesize_tags(category: &str, title: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    if category != UNCATEGORIZED {
        push_tokens(&mut tags, category_splitter().split(category));
    }
    push_tokens(&mut tags, word_splitter().split(title));
    tags.truncate(MAX_TAGS);
    if tags.is_empty() {
        tags.push(LAST_RESORT_TAG.to_string());
    }
    tags
}

fn push_tokens<'a>(out: &mut Vec<String>, tokens: impl Iterator<Item = &'a str>) {
    for token in tokens {
        let t = token.trim().to_lowercase();
        // two-letter tokens survive so acronyms like "ai" or "uk" are kept
        if t.chars().count() < 2 || STOP_WORDS.contains(&t.as_str()) { continue; }
        if !out.contains(&t) { out.push(t); }
    }
}

/// Clean up backend tags: lower-case, no leading '#', spaces to dashes,
/// unique, at most `MAX_TAGS`.
pub fn normalize_tags(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in raw {
        let t = tag.trim().trim_start_matches('#').to_lowercase();
        let t = t.split_whitespace().collect::<Vec<_>>().join("-");
        if t.is_empty() || out.contains(&t) { continue; }
        out.push(t);
        if out.len() == MAX_TAGS { break; }
    }
    out
}
