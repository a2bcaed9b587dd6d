use snafu::ensure;
use std::sync::Arc;
use tracing::*;

mod bpe;
mod config;
mod encoder;
mod error;
mod iterator;
mod ranks;
mod special;
mod token;

pub use bpe::*;
pub use config::*;
pub use encoder::{TokenDecoder, TokenEncoder, PATTERN_TIKTOKEN_V2};
pub use error::*;
pub use iterator::*;
pub use ranks::*;
pub use special::*;
pub use token::*;

use encoder::BpeParams;
use iterator::IteratorState;

pub type Result<T> = std::result::Result<T, RanktokError>;

/// The operations generation and serving code needs from a tokenizer, independent of how the
/// vocabulary is represented.
pub trait TextTokenizer: Send + Sync {
    /// Encode text into token ids, optionally framed with the BOS and EOS ids
    fn encode(&self, text: &str, add_bos: bool, add_eos: bool) -> Vec<TokenInt>;

    /// Decode token ids back into text
    fn decode(&self, tokens: &[TokenInt]) -> Result<String>;

    /// Total size of the id space
    fn vocab_size(&self) -> usize;

    fn bos(&self) -> TokenInt;

    fn eos(&self) -> TokenInt;

    fn unk(&self) -> TokenInt;
}

/// A byte-level BPE tokenizer with a block of reserved ids for special tokens.
///
/// Ids `0..num_special_tokens()` are the special tokens, in the order of their labels.  Every id
/// above that is an ordinary token: id `k` is the token with rank `k - num_special_tokens()` in
/// the rank table.
///
/// Instances are immutable once constructed and can be very cheaply cloned.  They are also thread
/// safe; a single instance can be used to encode or decode text in multiple threads
/// simultaneously.
#[derive(Clone)]
pub struct Tokenizer {
    params: Arc<BpeParams>,
    special: Arc<SpecialTokenTable>,

    /// What each id in `0..vocab_size` stands for, indexed by id
    decoder: Arc<[TokenPiece]>,

    vocab_size: usize,
    special_token_decoding: SpecialTokenDecoding,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("vocab_size", &self.vocab_size)
            .field("num_special_tokens", &self.num_special_tokens())
            .field("special_token_decoding", &self.special_token_decoding)
            .finish()
    }
}

impl Tokenizer {
    /// Load the vocabulary named in `config` and build a tokenizer from it.
    ///
    /// Fails if the special token configuration is invalid, if the vocabulary file is corrupt, or
    /// if the file doesn't have enough entries to fill `vocab_size - num_special_tokens` ranks.
    /// Extra entries beyond that are ignored.
    pub fn new(config: TokenizerConfig) -> Result<Self> {
        // Validate the cheap stuff before reading what could be a large file
        let special = SpecialTokenTable::new(
            config.special_tokens.clone(),
            config.num_special_tokens,
            config.vocab_size,
        )?;

        let ranks = RankTable::load(&config.vocab_path, Some(config.inner_vocab_size()))?;

        Self::with_special_tokens(ranks, special, &config)
    }

    /// Build a tokenizer around a rank table that's already been loaded.
    ///
    /// `config.vocab_path` is ignored; everything else is validated the same way as in
    /// [`Self::new`], except that a table larger than needed is an error rather than being
    /// truncated.
    pub fn from_parts(ranks: RankTable, config: &TokenizerConfig) -> Result<Self> {
        let special = SpecialTokenTable::new(
            config.special_tokens.clone(),
            config.num_special_tokens,
            config.vocab_size,
        )?;

        Self::with_special_tokens(ranks, special, config)
    }

    fn with_special_tokens(
        ranks: RankTable,
        special: SpecialTokenTable,
        config: &TokenizerConfig,
    ) -> Result<Self> {
        let num_special_tokens = special.len();
        let inner_vocab_size = config.inner_vocab_size();

        ensure!(
            ranks.len() == inner_vocab_size,
            VocabSizeMismatchSnafu {
                expected: inner_vocab_size,
                actual: ranks.len(),
                vocab_size: config.vocab_size,
                num_special_tokens,
            }
        );
        ensure!(
            ranks.covers_byte_alphabet(),
            IncompleteByteAlphabetSnafu { len: ranks.len() }
        );

        let decoder = special
            .labels()
            .iter()
            .map(|label| TokenPiece::Special(label.clone()))
            .chain(
                ranks
                    .iter()
                    .map(|(_, bytes)| TokenPiece::Ordinary(bytes.clone())),
            )
            .collect::<Arc<[_]>>();
        debug_assert_eq!(decoder.len(), config.vocab_size);

        debug!(
            vocab_size = config.vocab_size,
            num_special_tokens,
            special_token_decoding = %config.special_token_decoding,
            "Tokenizer ready"
        );

        Ok(Self {
            params: Arc::new(BpeParams::new(ranks)),
            special: Arc::new(special),
            decoder,
            vocab_size: config.vocab_size,
            special_token_decoding: config.special_token_decoding,
        })
    }

    /// Total size of the id space, special tokens included
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Number of reserved special token ids, which is also the offset between an ordinary
    /// token's rank and its id
    pub fn num_special_tokens(&self) -> usize {
        self.special.len()
    }

    pub fn bos(&self) -> TokenInt {
        self.special.bos()
    }

    pub fn eos(&self) -> TokenInt {
        self.special.eos()
    }

    pub fn unk(&self) -> TokenInt {
        self.special.unk()
    }

    /// End of document; the same id as [`Self::eos`]
    pub fn eod(&self) -> TokenInt {
        self.eos()
    }

    /// The id used to pad batches.  There's no dedicated padding token, so this is EOS.
    pub fn pad(&self) -> TokenInt {
        self.eos()
    }

    pub fn special_tokens(&self) -> &SpecialTokenTable {
        &self.special
    }

    pub fn special_token_decoding(&self) -> SpecialTokenDecoding {
        self.special_token_decoding
    }

    /// The ordinary vocabulary, from token bytes to rank.
    ///
    /// These are ranks, not ids; add [`Self::num_special_tokens`] to get the id.
    pub fn vocab(&self) -> &TokenEncoder {
        self.params.ranks.encoder()
    }

    /// The ordinary vocabulary, from rank to token bytes.
    ///
    /// These are ranks, not ids; subtract [`Self::num_special_tokens`] from an id first.
    pub fn inv_vocab(&self) -> &TokenDecoder {
        self.params.ranks.decoder()
    }

    pub fn rank_table(&self) -> &RankTable {
        &self.params.ranks
    }

    /// What each id stands for, indexed by id, covering the whole `0..vocab_size()` range
    pub fn decoder(&self) -> &[TokenPiece] {
        &self.decoder
    }

    /// What a single id stands for, or `None` if it's out of range
    pub fn token_piece(&self, token: TokenInt) -> Option<&TokenPiece> {
        self.decoder.get(token)
    }

    /// Make an educated guess as to the number of likely tokens in a given bit of text.
    ///
    /// This is not a precise calculation, but it's a good enough estimate for pre-allocating.
    pub fn estimate_num_tokens(&self, text: impl AsRef<str>) -> usize {
        self.params.estimate_num_tokens(text.as_ref())
    }

    /// Search the given input text for special token labels, returning an iterator that yields
    /// the id and matching text of each one.
    ///
    /// Encoding never produces special ids from text; a label in the input is encoded like any
    /// other text.  Use this to detect and handle such labels before encoding, if that matters.
    pub fn find_special_tokens<'me, 'text>(
        &'me self,
        text: &'text str,
    ) -> impl Iterator<Item = (TokenInt, &'text str)> + 'text
    where
        'me: 'text,
    {
        self.special.find_iter(text)
    }

    /// Split text into the pre-tokenizer's words, each of which is BPE encoded independently.
    pub fn split_words<'text>(&self, text: &'text str) -> WordIterator<'text> {
        WordIterator::new(IteratorState::new(self.params.clone(), text))
    }

    /// Lazily encode text into ordinary token ids, without BOS or EOS.
    pub fn encode_iter<'text>(&self, text: &'text str) -> impl Iterator<Item = TokenInt> + 'text {
        let shift = self.num_special_tokens();

        EncodeOrdinaryIterator::new(IteratorState::new(self.params.clone(), text))
            .map(move |rank| rank + shift)
    }

    /// Encode text into token ids, optionally framed with the BOS and EOS ids.
    ///
    /// This can't fail; every byte has a token, so any text can be encoded.  Special token labels
    /// appearing in `text` are encoded as ordinary text.
    pub fn encode(&self, text: impl AsRef<str>, add_bos: bool, add_eos: bool) -> Vec<TokenInt> {
        let text = text.as_ref();

        let mut tokens = Vec::with_capacity(self.estimate_num_tokens(text) + 2);
        if add_bos {
            tokens.push(self.bos());
        }
        tokens.extend(self.encode_iter(text));
        if add_eos {
            tokens.push(self.eos());
        }

        tokens
    }

    /// Encode text into ordinary token ids, without BOS or EOS
    pub fn encode_ordinary(&self, text: impl AsRef<str>) -> Vec<TokenInt> {
        self.encode(text, false, false)
    }

    /// Decode token ids into the bytes they came from.
    ///
    /// Every BOS and EOS id is dropped, wherever it appears.  Other special ids are handled
    /// according to [`Self::special_token_decoding`].  An id outside the vocabulary is an error.
    pub fn decode_to_bytes(&self, tokens: &[TokenInt]) -> Result<TokenString> {
        let (bos, eos) = (self.bos(), self.eos());
        let mut bytes = Vec::with_capacity(tokens.len() * self.params.mean_token_len);

        for &token in tokens {
            if token == bos || token == eos {
                continue;
            }

            match self.decoder.get(token) {
                Some(TokenPiece::Ordinary(token_bytes)) => bytes.extend_from_slice(token_bytes),
                Some(TokenPiece::Special(label)) => match self.special_token_decoding {
                    SpecialTokenDecoding::Reject => {
                        return SpecialTokenNotDecodableSnafu { token, label }.fail();
                    }
                    SpecialTokenDecoding::Skip => {}
                    SpecialTokenDecoding::Label => bytes.extend_from_slice(label.as_bytes()),
                },
                None => {
                    return TokenOutOfRangeSnafu {
                        token,
                        vocab_size: self.vocab_size,
                    }
                    .fail();
                }
            }
        }

        Ok(bytes)
    }

    /// Decode token ids into the text they came from.
    ///
    /// A sequence of ids is not guaranteed to decode to valid UTF-8, for example if it was cut off
    /// in the middle of a multi-byte character.  Invalid sequences are replaced with U+FFFD.  Use
    /// [`Self::decode_to_bytes`] to get the exact bytes instead.
    pub fn decode(&self, tokens: &[TokenInt]) -> Result<String> {
        let bytes = self.decode_to_bytes(tokens)?;

        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }
}

impl TextTokenizer for Tokenizer {
    fn encode(&self, text: &str, add_bos: bool, add_eos: bool) -> Vec<TokenInt> {
        Tokenizer::encode(self, text, add_bos, add_eos)
    }

    fn decode(&self, tokens: &[TokenInt]) -> Result<String> {
        Tokenizer::decode(self, tokens)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn bos(&self) -> TokenInt {
        Tokenizer::bos(self)
    }

    fn eos(&self) -> TokenInt {
        Tokenizer::eos(self)
    }

    fn unk(&self) -> TokenInt {
        Tokenizer::unk(self)
    }
}
