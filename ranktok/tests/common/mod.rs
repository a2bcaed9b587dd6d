//! Vocabulary builders shared by the integration tests.
#![allow(dead_code)]

use ranktok::MergeEntry;
use std::io::Write;
use tempfile::NamedTempFile;

/// Merges that look a bit like what a real trainer would produce on English text, in priority
/// order.
pub const ENGLISH_MERGES: &[&str] = &[
    "th", "he", "in", "er", "an", " t", " a", "on", "re", "ou", "en", "at", "ed", "nd", "is", "or",
    " s", " w", " o", " i", "es", "it", "ll", " th", "the", " the", "ing", "and", " and", "ar",
    " c", " b", "al", " f", " p", "le", "el", "lo", "hel", "llo", "hello", " wor", " world", "wor",
    "ld", "world", " m", "ro", "ic", "un", "  ", "   ", "\n\n", ".\n", "12", "ca", "st", "ion",
];

/// The 256 single byte entries every vocabulary starts with
pub fn byte_alphabet() -> Vec<MergeEntry> {
    (0..=255u8)
        .map(|b| MergeEntry::new(b as usize, [b]))
        .collect()
}

/// The byte alphabet followed by the given merges, ranked in order
pub fn vocab_with_merges<M: AsRef<[u8]>>(merges: impl IntoIterator<Item = M>) -> Vec<MergeEntry> {
    let mut entries = byte_alphabet();
    for merge in merges {
        entries.push(MergeEntry::new(entries.len(), merge));
    }
    entries
}

pub fn english_vocab() -> Vec<MergeEntry> {
    vocab_with_merges(ENGLISH_MERGES.iter())
}

/// `count` distinct two byte merges made from printable ASCII
pub fn generated_merges(count: usize) -> Vec<Vec<u8>> {
    (0x21..0x7fu8)
        .flat_map(|a| (0x21..0x7fu8).map(move |b| vec![a, b]))
        .take(count)
        .collect()
}

/// Write entries to a temporary JSON vocabulary file
pub fn write_vocab(entries: &[MergeEntry]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    serde_json::to_writer(&mut file, entries).unwrap();
    file.flush().unwrap();
    file
}
