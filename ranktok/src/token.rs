/// A token output by the tokenizer, represented in its integer form.
///
/// Inside the rank table this is the merge rank of the token.  Once it leaves the tokenizer it is
/// an id in the combined vocabulary, which is the rank shifted up past the block of reserved
/// special token ids.  Both are the same Rust type; which space an integer lives in is determined
/// by where it came from.
pub type TokenInt = usize;

/// A token in its byte string form.
///
/// Ordinary tokens are arbitrary byte sequences and are not necessarily valid UTF-8 on their own;
/// only a complete sequence of tokens produced from a string is guaranteed to decode cleanly.
pub type TokenString = Vec<u8>;

/// What a single id in the combined vocabulary stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenPiece {
    /// One of the reserved control tokens, identified by its label
    Special(String),

    /// A byte sequence from the rank table
    Ordinary(TokenString),
}

impl TokenPiece {
    pub fn is_special(&self) -> bool {
        matches!(self, Self::Special(_))
    }

    /// The raw bytes of an ordinary token, or the UTF-8 bytes of a special token's label
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Special(label) => label.as_bytes(),
            Self::Ordinary(bytes) => bytes,
        }
    }
}
