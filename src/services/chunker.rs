//! Sentence-bounded text chunking.

use std::sync::LazyLock;

use regex::Regex;

/// Default sentence window per chunk.
pub const DEFAULT_MAX_SENTENCES: usize = 3;

// A sentence is the maximal run of characters up to and including a
// terminator (. ! ?).
static RE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]+").unwrap());

/// Split `text` into chunks of at most `max_sentences` sentences each,
/// preserving original order.
///
/// Chunk boundaries are sentence-aligned; a chunk never splits mid-sentence.
/// Text without any terminal punctuation degenerates to a single chunk
/// holding the trimmed input, so non-empty input never yields an empty
/// result. Deterministic, linear in input length.
pub fn chunk_by_sentences(text: &str, max_sentences: usize) -> Vec<String> {
    let max_sentences = max_sentences.max(1);

    let sentences: Vec<&str> = RE_SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .collect();

    if sentences.is_empty() {
        return vec![text.trim().to_string()];
    }

    sentences
        .chunks(max_sentences)
        .map(|window| window.join(" "))
        .collect()
}
