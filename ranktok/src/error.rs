use crate::{TokenInt, TokenString};
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RanktokError {
    #[snafu(display("File I/O error on file '{}'", path.display()))]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "Vocabulary is not a list of {{rank, token_bytes, token_str}} records: {source}"
    ))]
    MalformedVocab { source: serde_json::Error },

    #[snafu(display("Entry {position} has token bytes that are not valid base64: {source}"))]
    InvalidBase64 {
        position: usize,
        source: base64::DecodeError,
    },

    #[snafu(display("Entry {position} claims rank {rank}; ranks must match their position"))]
    RankMismatch { position: usize, rank: TokenInt },

    #[snafu(display(
        "Rank {rank} must be the single byte [{rank}] but the vocabulary has {bytes:?}"
    ))]
    ByteAlphabet { rank: TokenInt, bytes: TokenString },

    #[snafu(display("Rank {rank} repeats the token bytes {bytes:?} already assigned rank {existing}"))]
    DuplicateTokenBytes {
        rank: TokenInt,
        existing: TokenInt,
        bytes: TokenString,
    },

    #[snafu(display("Rank table has {found} distinct ranks but {expected} entries"))]
    MissingRanks { expected: usize, found: usize },

    #[snafu(display("Special token '{label}' appears more than once"))]
    DuplicateSpecialToken { label: String },

    #[snafu(display("Special tokens must include '{label}'"))]
    MissingSpecialToken { label: String },

    #[snafu(display(
        "Invalid special token sizing: {labels} labels, {num_special_tokens} reserved ids, vocab size {vocab_size}; \
         need labels <= reserved ids < vocab size"
    ))]
    SpecialTokenCount {
        labels: usize,
        num_special_tokens: usize,
        vocab_size: usize,
    },

    #[snafu(display(
        "Vocabulary has {actual} usable entries but vocab size {vocab_size} with {num_special_tokens} special tokens needs {expected}"
    ))]
    VocabSizeMismatch {
        expected: usize,
        actual: usize,
        vocab_size: usize,
        num_special_tokens: usize,
    },

    #[snafu(display("Rank table has {len} entries; all 256 single bytes are required"))]
    IncompleteByteAlphabet { len: usize },

    #[snafu(display("Token {token} is outside the vocabulary (size {vocab_size})"))]
    TokenOutOfRange { token: TokenInt, vocab_size: usize },

    #[snafu(display("Special token {token} ('{label}') has no text to decode to"))]
    SpecialTokenNotDecodable { token: TokenInt, label: String },
}
