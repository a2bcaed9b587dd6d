//! The choice of hash algorithm and hash function used to maintain the lookup table mapping byte
//! sequences to token ranks has a big impact on merge performance, since the BPE loop does one
//! lookup per candidate pair.
//!
//! This is isolated to this module to make it easier to experiment with different impls.
use crate::token::{TokenInt, TokenString};

pub use rustc_hash::FxHashMap as HashMap;

/// Encoders maintain the mapping between byte sequences and the ranks assigned to them in the
/// vocabulary.
#[derive(Clone, Debug, Default)]
pub struct TokenEncoder(HashMap<TokenString, TokenInt>);

/// Decoders maintain the reverse mapping, from the integer representation of the token to the
/// corresponding byte sequence.
#[derive(Clone, Debug, Default)]
pub struct TokenDecoder(HashMap<TokenInt, TokenString>);

impl TokenEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(HashMap::with_capacity_and_hasher(
            capacity,
            Default::default(),
        ))
    }

    /// Add a token, returning the rank previously assigned to the same bytes if there was one.
    pub(crate) fn insert(&mut self, bytes: TokenString, rank: TokenInt) -> Option<TokenInt> {
        self.0.insert(bytes, rank)
    }

    pub fn token_for_bytes(&self, bytes: impl AsRef<[u8]>) -> Option<TokenInt> {
        self.0.get(bytes.as_ref()).copied()
    }

    /// Invert the lookup table so the keys become the values, which is another way of describing a
    /// decoder
    pub fn invert(&self) -> TokenDecoder {
        TokenDecoder(
            self.0
                .iter()
                .map(|(bytes, rank)| (*rank, bytes.clone()))
                .collect(),
        )
    }

    /// All token strings in the encoder
    pub fn token_strings(&self) -> impl Iterator<Item = &TokenString> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TokenDecoder {
    pub fn bytes_for_token(&self, token: TokenInt) -> Option<&TokenString> {
        self.0.get(&token)
    }

    pub fn contains(&self, token: TokenInt) -> bool {
        self.0.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
