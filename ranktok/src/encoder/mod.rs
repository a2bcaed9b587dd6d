use crate::ranks::RankTable;
use once_cell::sync::Lazy;

mod hash;

pub(crate) use hash::HashMap;
pub use hash::{TokenDecoder, TokenEncoder};

/// Regex used to break up text into approximate word boundaries before BPE is applied.
///
/// Runs of letters (with an optional leading non-letter, and case-aware so that `CamelCase` splits
/// into `Camel` and `Case`), single digits, punctuation runs with an optional leading space, and
/// whitespace runs.  The exact grammar is part of the vocabulary's definition: a table trained
/// with this pattern only round trips ids with other implementations if the split is identical,
/// so this must not be edited.
pub const PATTERN_TIKTOKEN_V2: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*|\p{N}| ?[^\s\p{L}\p{N}]+[\r\n/]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// The compiled [`PATTERN_TIKTOKEN_V2`].
///
/// The pattern uses a negative lookahead, which the regular `regex` crate doesn't support, so the
/// slower 'fancy' impl is needed.  It's compiled once and shared by every tokenizer in the process.
pub(crate) static WORD_REGEX: Lazy<fancy_regex::Regex> = Lazy::new(|| {
    fancy_regex::Regex::new(PATTERN_TIKTOKEN_V2).expect("BUG: Invalid pre-tokenizer regex")
});

/// Everything the BPE encoding iterators need: the rank table, the word splitting regex, and some
/// statistics derived from the table.
pub(crate) struct BpeParams {
    /// Mapping of byte sequences to integer token ranks, and back
    pub(crate) ranks: RankTable,

    pub(crate) regex: &'static fancy_regex::Regex,

    /// The mean length of a token in bytes.
    ///
    /// This is used when we need to estimate how many tokens are likely to be in a string.
    pub(crate) mean_token_len: usize,
}

impl BpeParams {
    pub(crate) fn new(ranks: RankTable) -> Self {
        // Calculate the average length of the tokens
        let total_len = ranks
            .encoder()
            .token_strings()
            .map(|bytes| bytes.len() as u64)
            .sum::<u64>();
        let mean_token_len = (total_len / ranks.len().max(1) as u64).max(1);

        Self {
            ranks,
            regex: &WORD_REGEX,
            mean_token_len: mean_token_len as usize,
        }
    }

    pub(crate) fn encoder(&self) -> &TokenEncoder {
        self.ranks.encoder()
    }

    /// Make an educated guess as to the number of likely tokens in a given bit of text.
    pub(crate) fn estimate_num_tokens(&self, text: &str) -> usize {
        // Use a dumb strategy: we know the mean length of a token in this encoding, and assume the
        // text is full of the mean tokens.
        (text.len() + self.mean_token_len - 1) / self.mean_token_len
    }
}
