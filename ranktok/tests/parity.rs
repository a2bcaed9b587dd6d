//! Compare our encoder against `tiktoken-rs` for correctness only.
//!
//! tiktoken's `CoreBPE` applies the same pre-tokenizer pattern and merge algorithm, but knows
//! nothing about the reserved special token block, so its output is compared against our ranks
//! (ids with the shift removed).
use proptest::prelude::*;
use ranktok::{RankTable, Tokenizer, TokenizerConfig, PATTERN_TIKTOKEN_V2};
use tiktoken_rs::CoreBPE;

mod common;
use common::*;

const NUM_SPECIAL_TOKENS: usize = 7;

fn tokenizer() -> Tokenizer {
    let ranks = RankTable::from_entries(english_vocab(), None).unwrap();
    let config = TokenizerConfig {
        vocab_size: ranks.len() + NUM_SPECIAL_TOKENS,
        num_special_tokens: NUM_SPECIAL_TOKENS,
        ..Default::default()
    };

    Tokenizer::from_parts(ranks, &config).unwrap()
}

fn tiktoken(tokenizer: &Tokenizer) -> CoreBPE {
    let encoder = tokenizer
        .rank_table()
        .iter()
        .map(|(rank, bytes)| (bytes.clone(), rank as _))
        .collect();

    CoreBPE::new(encoder, Default::default(), PATTERN_TIKTOKEN_V2).unwrap()
}

fn our_ranks(tokenizer: &Tokenizer, text: &str) -> Vec<usize> {
    tokenizer
        .encode_ordinary(text)
        .into_iter()
        .map(|id| id - NUM_SPECIAL_TOKENS)
        .collect()
}

fn their_ranks(bpe: &CoreBPE, text: &str) -> Vec<usize> {
    bpe.encode_ordinary(text)
        .into_iter()
        .map(|rank| rank as usize)
        .collect()
}

/// Simple sanity check matches with tiktoken.  Will use proptest for the exhaustive testing
#[test]
fn encode_simple() {
    let tokenizer = tokenizer();
    let bpe = tiktoken(&tokenizer);

    for text in [
        "hello world",
        "The cat and the hat.\n\nThe end",
        "  leading and trailing spaces   ",
        "1234567 numbers, punctuation!? and CamelCase",
        "Ünïcödé: 中文, emoji 🦀 and tabs\t\there",
    ] {
        assert_eq!(their_ranks(&bpe, text), our_ranks(&tokenizer, text), "{text:?}");
    }
}

/// Whitespace runs long enough to be split without the regex, but short enough that tiktoken's
/// regex still copes with them
#[test]
fn encode_long_whitespace_runs() {
    let tokenizer = tokenizer();
    let bpe = tiktoken(&tokenizer);

    for text in [
        format!("{}x", " ".repeat(2_000)),
        format!("hello{}world", " ".repeat(1_000)),
        format!("{}\r\n   the end", "\t \u{a0}".repeat(700)),
        format!("{}{}", " \n".repeat(600), " ".repeat(600)),
        format!("{}\n\n", "\u{3000}".repeat(800)),
    ] {
        assert_eq!(their_ranks(&bpe, &text), our_ranks(&tokenizer, &text), "{text:?}");
    }
}

proptest! {
    /// encoding any printable characters should produce the same results with our impl or
    /// tiktoken's
    #[test]
    fn encodes_anything(s in "\\PC*") {
        let tokenizer = tokenizer();
        let bpe = tiktoken(&tokenizer);

        prop_assert_eq!(their_ranks(&bpe, &s), our_ranks(&tokenizer, &s));
    }

    #[test]
    fn encodes_long_whitespace_runs(
        parts in prop::collection::vec(r"[ \t\r\n\x{a0}]{250,400}|[a-zA-Z.,]{1,6}", 1..6)
    ) {
        let tokenizer = tokenizer();
        let bpe = tiktoken(&tokenizer);
        let s = parts.concat();

        prop_assert_eq!(their_ranks(&bpe, &s), our_ranks(&tokenizer, &s));
    }

    #[test]
    fn encodes_english_like_text(s in "([a-zA-Z]{1,8}[ ,.\n]{1,3}){0,20}") {
        let tokenizer = tokenizer();
        let bpe = tiktoken(&tokenizer);

        prop_assert_eq!(their_ranks(&bpe, &s), our_ranks(&tokenizer, &s));
    }
}
