//! Decoding tokens as a generation engine produces them.
use crate::Result;
use ranktok::{TextTokenizer, TokenInt};
use tracing::*;

const REPLACEMENT_CHARACTER: char = '\u{fffd}';

/// Turns a growing sequence of token ids into a sequence of text deltas.
///
/// Each call to [`Self::push`] decodes the whole sequence so far, the same way a generation loop
/// re-decodes its output after every step, and returns only the text that wasn't returned
/// before.  A token can end in the middle of a multi-byte character; text that currently ends in
/// a replacement character is held back until more tokens arrive or [`Self::finish`] is called.
pub struct IncrementalDecoder<'a, T: TextTokenizer + ?Sized> {
    tokenizer: &'a T,
    tokens: Vec<TokenInt>,

    /// Text already handed out by `push`
    emitted: String,
}

impl<'a, T: TextTokenizer + ?Sized> IncrementalDecoder<'a, T> {
    pub fn new(tokenizer: &'a T) -> Self {
        Self {
            tokenizer,
            tokens: Vec::new(),
            emitted: String::new(),
        }
    }

    /// All tokens pushed so far
    pub fn tokens(&self) -> &[TokenInt] {
        &self.tokens
    }

    /// Add newly generated tokens, returning the text they complete
    pub fn push(&mut self, new_tokens: &[TokenInt]) -> Result<String> {
        self.tokens.extend_from_slice(new_tokens);

        let text = self.tokenizer.decode(&self.tokens)?;
        let stable = text.trim_end_matches(REPLACEMENT_CHARACTER);

        Ok(self.take_delta(stable))
    }

    /// Flush any held back text; call once generation is complete
    pub fn finish(mut self) -> Result<String> {
        let text = self.tokenizer.decode(&self.tokens)?;

        Ok(self.take_delta(&text))
    }

    fn take_delta(&mut self, text: &str) -> String {
        match text.strip_prefix(self.emitted.as_str()) {
            Some(delta) => {
                let delta = delta.to_string();
                self.emitted.push_str(&delta);
                delta
            }
            None => {
                // Only possible if the decoded text shrank, which means the caller changed the
                // tokenizer's view of earlier tokens.  There's nothing sensible to emit.
                warn!(
                    emitted = self.emitted.len(),
                    decoded = text.len(),
                    "Decoded text no longer extends previously emitted text"
                );
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn deltas_concatenate_to_full_text() {
        let tokenizer = test_tokenizer();
        const TEXT: &str = "hello world, the cat and the token";
        let ids = tokenizer.encode(TEXT, true, true);

        let mut decoder = IncrementalDecoder::new(&tokenizer);
        let mut output = String::new();
        for id in &ids {
            output.push_str(&decoder.push(&[*id]).unwrap());
        }
        output.push_str(&decoder.finish().unwrap());

        assert_eq!(TEXT, output);
    }

    #[test]
    fn holds_back_partial_characters() {
        let tokenizer = test_tokenizer();
        let ids = tokenizer.encode_ordinary("a🦀");

        // 'a' plus the four bytes of the crab, none of which merge in the test vocabulary
        assert_eq!(5, ids.len());

        let mut decoder = IncrementalDecoder::new(&tokenizer);
        assert_eq!("a", decoder.push(&ids[..1]).unwrap());
        assert_eq!("", decoder.push(&ids[1..3]).unwrap());
        assert_eq!("", decoder.push(&ids[3..4]).unwrap());
        assert_eq!("🦀", decoder.push(&ids[4..]).unwrap());
        assert_eq!("", decoder.finish().unwrap());
    }

    #[test]
    fn finish_flushes_incomplete_tail() {
        let tokenizer = test_tokenizer();
        let ids = tokenizer.encode_ordinary("🦀");

        let mut decoder = IncrementalDecoder::new(&tokenizer);
        assert_eq!("", decoder.push(&ids[..2]).unwrap());
        assert_eq!(2, decoder.tokens().len());
        assert_eq!("\u{fffd}", decoder.finish().unwrap());
    }

    #[test]
    fn works_with_trait_objects() {
        let tokenizer = test_tokenizer();
        let dyn_tokenizer: &dyn TextTokenizer = &tokenizer;
        let ids = tokenizer.encode_ordinary("hello");

        let mut decoder = IncrementalDecoder::new(dyn_tokenizer);
        assert_eq!("hello", decoder.push(&ids).unwrap());
    }
}
