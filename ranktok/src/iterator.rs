//! Contains the implementation of the bulk of the tokenization logic, implemented as a Rust
//! [`Iterator`].

use crate::encoder::BpeParams;
use crate::{bpe, TokenInt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::*;

/// Whitespace runs at least this many chars long are split without the regex.  The regex VM
/// backtracks through `\s+(?!\S)` one char at a time, so a long enough run exhausts its stack.
const LONG_WHITESPACE_RUN: usize = 256;

/// The internal state of all iterator variants.
#[derive(Clone)]
pub(crate) struct IteratorState<'a> {
    /// The parameters for the encoding this iterator applies
    params: Arc<BpeParams>,

    /// The input text that is being tokenized and encoded
    text: &'a str,
}

impl<'a> IteratorState<'a> {
    pub(crate) fn new(params: Arc<BpeParams>, text: &'a str) -> Self {
        Self { params, text }
    }
}

/// Applies the pre-tokenizer regex to get the next "word", as defined by the regex itself.
pub struct WordIterator<'a> {
    state: IteratorState<'a>,

    /// The offset into `text` where the next iteration should start to process
    pos: usize,
}

impl<'a> WordIterator<'a> {
    pub(crate) fn new(state: IteratorState<'a>) -> Self {
        Self { state, pos: 0 }
    }
}

impl<'a> Iterator for WordIterator<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.state.text;

        let (start, end) = match long_whitespace_word(&text[self.pos..]) {
            Some(len) => (self.pos, self.pos + len),
            None => match self.state.params.regex.find_from_pos(text, self.pos) {
                Ok(Some(m)) => (m.start(), m.end()),
                Ok(None) => return None,
                Err(e) => {
                    // Encoding has to accept any text, so split off a single char and carry on
                    let len = text[self.pos..].chars().next()?.len_utf8();
                    warn!(
                        err = %e,
                        pos = self.pos,
                        "Pre-tokenizer regex failed; splitting off one char"
                    );
                    (self.pos, self.pos + len)
                }
            },
        };
        self.pos = end;

        Some(&text[start..end])
    }
}

/// If `text` starts with a whitespace run of at least [`LONG_WHITESPACE_RUN`] chars, the length in
/// bytes of the word the pre-tokenizer pattern would split off the front of it.
///
/// A run of two or more whitespace chars can only match the pattern's whitespace alternatives:
/// `\s*[\r\n]+` takes everything up to and including the last line break in the run, otherwise
/// `\s+(?!\S)` takes the whole run if it ends the text, or all but its last char, which is left
/// to lead the next word.
fn long_whitespace_word(text: &str) -> Option<usize> {
    let mut chars = 0;
    let mut run_end = text.len();
    let mut last_char_start = 0;
    let mut last_line_break_end = None;

    for (offset, c) in text.char_indices() {
        if !c.is_whitespace() {
            run_end = offset;
            break;
        }
        chars += 1;
        last_char_start = offset;
        if c == '\r' || c == '\n' {
            last_line_break_end = Some(offset + c.len_utf8());
        }
    }

    if chars < LONG_WHITESPACE_RUN {
        return None;
    }

    Some(match last_line_break_end {
        Some(end) => end,
        None if run_end == text.len() => run_end,
        None => last_char_start,
    })
}

/// The iterator which yields the ranks of the ordinary tokens in a string of text.
///
/// The values yielded are ranks in the rank table, not yet shifted into the combined id space.
/// See [`crate::Tokenizer::encode_iter`] for the shifted form.
pub struct EncodeOrdinaryIterator<'a> {
    state: IteratorState<'a>,
    words: WordIterator<'a>,

    /// Tokens found in the current word, if the word itself didn't map directly to a token.
    /// If there are any tokens here, they're removed from the front of the queue one iteration
    /// cycle at a time
    current_word_tokens: VecDeque<TokenInt>,
}

impl<'a> EncodeOrdinaryIterator<'a> {
    pub(crate) fn new(state: IteratorState<'a>) -> Self {
        Self {
            words: WordIterator::new(state.clone()),
            state,
            current_word_tokens: VecDeque::new(),
        }
    }
}

impl<'a> Iterator for EncodeOrdinaryIterator<'a> {
    type Item = TokenInt;

    fn next(&mut self) -> Option<Self::Item> {
        // If there are still tokens left from a previously iterated word, use one of them
        if let Some(token) = self.current_word_tokens.pop_front() {
            return Some(token);
        }

        let word = self.words.next()?;

        // Either the word is itself a token, in which case we're done, or it's not and we need to
        // break the word up into subword tokens with the BPE algorithm
        let encoder = self.state.params.encoder();
        if let Some(token) = encoder.token_for_bytes(word) {
            return Some(token);
        }

        let tokens = bpe::byte_pair_encode(word.as_bytes(), encoder);
        debug_assert!(!tokens.is_empty());

        self.current_word_tokens.clear();
        self.current_word_tokens.extend(tokens);

        self.current_word_tokens.pop_front()
    }
}
