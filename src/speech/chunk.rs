use std::num::NonZeroUsize;

use once_cell::sync::Lazy;
use regex::Regex;

/// Default upper bound on the number of characters handed to the engine
/// in a single utterance.
pub const DEFAULT_MAX_CHUNK_CHARS: NonZeroUsize = match NonZeroUsize::new(3900) {
    Some(value) => value,
    None => panic!("chunk limit must be positive"),
};

static PERIOD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").unwrap());

/// Split `text` into chunks of at most `max_chars` characters, breaking only
/// after sentence-ending periods.
///
/// Sentences are trimmed and greedily packed into a buffer, each followed by
/// a single space. A sentence that is longer than the limit on its own is
/// emitted whole, never cut.
pub fn split_into_chunks(text: &str, max_chars: NonZeroUsize) -> Vec<String> {
    let max_chars = max_chars.get();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for unit in sentence_units(text) {
        let unit_len = unit.chars().count();
        if current_len > 0 && current_len + unit_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(unit);
        current.push(' ');
        current_len += unit_len + 1;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Trimmed, non-empty sentences of `text`, each ending after its closing
/// period.
///
/// A run of periods (an ellipsis) closes a single sentence. Deliberately
/// not a split after every period, which turns "Wait..." into "Wait." and
/// two lone "." units.
fn sentence_units(text: &str) -> impl Iterator<Item = &str> {
    let mut units = Vec::new();
    let mut start = 0;
    for period_run in PERIOD_RUN.find_iter(text) {
        units.push(&text[start..period_run.end()]);
        start = period_run.end();
    }
    units.push(&text[start..]);

    units
        .into_iter()
        .map(str::trim)
        .filter(|unit| !unit.is_empty())
}
