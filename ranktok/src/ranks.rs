//! Loading and validation of the rank table, also called the "mergeable ranks" in tiktoken.
//!
//! The on-disk format is a JSON list of records, one per token, in rank order:
//!
//! ```json
//! [
//!   {"rank": 0, "token_bytes": "AA==", "token_str": "\u0000"},
//!   {"rank": 1, "token_bytes": "AQ==", "token_str": "\u0001"}
//! ]
//! ```
//!
//! A vocabulary that fails any of the structural checks here is treated as corrupt.  There is no
//! best-effort recovery, since a quietly repaired table would produce a tokenizer that works but
//! assigns the wrong ids.
use crate::encoder::{TokenDecoder, TokenEncoder};
use crate::error::*;
use crate::{Result, TokenInt, TokenString};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::*;

/// Number of ranks reserved at the bottom of the table for the single byte tokens `[0]..=[255]`.
pub const BYTE_ALPHABET_SIZE: usize = 256;

/// One record of a serialized vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MergeEntry {
    pub rank: TokenInt,

    /// The token's bytes, base64 encoded with the standard alphabet
    pub token_bytes: String,

    /// Human readable form of the token.  Informational only; never validated.
    pub token_str: String,
}

impl MergeEntry {
    /// Make an entry for the given bytes, filling in `token_str` with a lossy UTF-8 rendering.
    pub fn new(rank: TokenInt, bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();

        Self {
            rank,
            token_bytes: general_purpose::STANDARD.encode(bytes),
            token_str: String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn decode_bytes(&self) -> std::result::Result<TokenString, base64::DecodeError> {
        general_purpose::STANDARD.decode(&self.token_bytes)
    }
}

/// Bidirectional mapping between token byte sequences and their dense ranks `0..len()`.
///
/// Once constructed the table is guaranteed to be bijective, and every rank below 256 (as far as
/// the table reaches) maps to the corresponding single byte.
#[derive(Clone, Debug)]
pub struct RankTable {
    encoder: TokenEncoder,
    decoder: TokenDecoder,
}

/// Load a rank table from a JSON vocabulary file, keeping at most the first `max_size` entries.
pub fn load_rank_table(path: impl AsRef<Path>, max_size: Option<usize>) -> Result<RankTable> {
    RankTable::load(path, max_size)
}

impl RankTable {
    /// Load a rank table from a JSON vocabulary file.
    ///
    /// If `max_size` is given, only that many of the lowest ranked entries are kept.  The dropped
    /// entries are the least frequent merges, so a truncated table is still a valid (if less
    /// efficient) vocabulary.
    pub fn load(path: impl AsRef<Path>, max_size: Option<usize>) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "Loading rank table");
        let file = File::open(path).context(FileIoSnafu { path })?;

        Self::from_reader(BufReader::new(file), max_size)
    }

    /// Like [`Self::load`] but reads the JSON from any reader
    pub fn from_reader(reader: impl Read, max_size: Option<usize>) -> Result<Self> {
        let entries: Vec<MergeEntry> =
            serde_json::from_reader(reader).context(MalformedVocabSnafu)?;

        Self::from_entries(entries, max_size)
    }

    /// Build and validate a rank table from already deserialized entries
    pub fn from_entries(
        entries: impl IntoIterator<Item = MergeEntry>,
        max_size: Option<usize>,
    ) -> Result<Self> {
        let mut entries = entries.into_iter().collect::<Vec<_>>();
        debug!(vocab_size = entries.len(), "Read vocabulary");

        if let Some(max_size) = max_size {
            if max_size < entries.len() {
                entries.truncate(max_size);
                debug!(vocab_size = entries.len(), "Cut vocabulary down to its lowest ranks");
            }
        }

        let mut encoder = TokenEncoder::with_capacity(entries.len());

        for (position, entry) in entries.iter().enumerate() {
            ensure!(
                entry.rank == position,
                RankMismatchSnafu {
                    position,
                    rank: entry.rank
                }
            );

            let bytes = entry
                .decode_bytes()
                .context(InvalidBase64Snafu { position })?;

            ensure!(
                position >= BYTE_ALPHABET_SIZE || bytes == [position as u8],
                ByteAlphabetSnafu {
                    rank: position,
                    bytes
                }
            );

            if let Some(existing) = encoder.token_for_bytes(&bytes) {
                return DuplicateTokenBytesSnafu {
                    rank: position,
                    existing,
                    bytes,
                }
                .fail();
            }

            encoder.insert(bytes, position);
        }

        let decoder = encoder.invert();

        // With the checks above these can't fail, but they are what actually defines a valid
        // table so check them on the finished product too.
        ensure!(
            encoder.len() == entries.len()
                && decoder.len() == entries.len()
                && (0..entries.len()).all(|rank| decoder.contains(rank)),
            MissingRanksSnafu {
                expected: entries.len(),
                found: decoder.len()
            }
        );

        Ok(Self { encoder, decoder })
    }

    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// True if every single byte value has its own token, which is what makes encoding total.
    pub fn covers_byte_alphabet(&self) -> bool {
        self.len() >= BYTE_ALPHABET_SIZE
    }

    pub fn rank_for_bytes(&self, bytes: impl AsRef<[u8]>) -> Option<TokenInt> {
        self.encoder.token_for_bytes(bytes)
    }

    pub fn bytes_for_rank(&self, rank: TokenInt) -> Option<&TokenString> {
        self.decoder.bytes_for_token(rank)
    }

    /// All `(rank, bytes)` pairs in rank order
    pub fn iter(&self) -> impl Iterator<Item = (TokenInt, &TokenString)> + '_ {
        (0..self.len()).filter_map(|rank| self.bytes_for_rank(rank).map(|bytes| (rank, bytes)))
    }

    /// The bytes to rank mapping
    pub fn encoder(&self) -> &TokenEncoder {
        &self.encoder
    }

    /// The rank to bytes mapping
    pub fn decoder(&self) -> &TokenDecoder {
        &self.decoder
    }
}
