//! Text normalization applied to extracted document text before chunking.

use regex::Regex;
use std::sync::OnceLock;

fn non_ascii() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\x00-\x7F]+").expect("literal regex"))
}

fn hyphen_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w)-\r?\n(\w)").expect("literal regex"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("literal regex"))
}

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("literal regex"))
}

/// Clean OCR-style text: drop non-ASCII, re-join words hyphenated across a
/// line break, turn soft wraps into spaces and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let text = non_ascii().replace_all(raw, " ");
    let text = hyphen_break().replace_all(&text, "$1$2");
    let text = text.replace(['\r', '\n'], " ");
    whitespace_run().replace_all(&text, " ").trim().to_string()
}

/// Split on terminal punctuation followed by whitespace. The punctuation
/// stays with its sentence; sentences are trimmed and empty ones dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.replace(['\r', '\n'], " ");
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_boundary().find_iter(&text) {
        // Terminal punctuation is a single ASCII byte.
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
