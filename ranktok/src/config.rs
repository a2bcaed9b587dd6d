use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::EnumString;

/// Vocabulary size used when none is configured: 2^17 ids in total.
pub const DEFAULT_VOCAB_SIZE: usize = 1 << 17;

/// Number of reserved special token ids used when none is configured; just enough for the three
/// canonical labels.
pub const DEFAULT_NUM_SPECIAL_TOKENS: usize = 3;

/// What [`crate::Tokenizer::decode`] does with a special token id other than BOS or EOS.
///
/// BOS and EOS are always dropped.  Other special ids (the unknown token, and any placeholder
/// or custom labels) have no byte content in the rank table, so there's no single right answer.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    PartialEq,
    Deserialize,
    Serialize,
    EnumString,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SpecialTokenDecoding {
    /// Fail the decode with [`crate::RanktokError::SpecialTokenNotDecodable`]
    #[default]
    Reject,

    /// Drop the id silently, the same way BOS and EOS are dropped
    Skip,

    /// Emit the special token's label text, e.g. `<unk>`
    Label,
}

/// Everything needed to construct a [`crate::Tokenizer`].
///
/// Typically constructed with struct update syntax on top of the default, or deserialized from
/// JSON where any missing field takes its default value.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Path to the JSON vocabulary file
    pub vocab_path: PathBuf,

    /// Total size of the id space, special tokens included
    pub vocab_size: usize,

    /// Size of the reserved block of ids at the bottom of the id space
    pub num_special_tokens: usize,

    /// Explicit special token labels.  If `None`, [`crate::DEFAULT_SPECIAL_TOKENS`] is used.
    /// Either way, unused reserved ids are filled in with placeholder labels.
    pub special_tokens: Option<Vec<String>>,

    pub special_token_decoding: SpecialTokenDecoding,
}

impl TokenizerConfig {
    pub fn new(vocab_path: impl Into<PathBuf>) -> Self {
        Self {
            vocab_path: vocab_path.into(),
            ..Default::default()
        }
    }

    /// Number of ordinary (rank table) tokens implied by this config
    pub fn inner_vocab_size(&self) -> usize {
        self.vocab_size.saturating_sub(self.num_special_tokens)
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            vocab_path: PathBuf::new(),
            vocab_size: DEFAULT_VOCAB_SIZE,
            num_special_tokens: DEFAULT_NUM_SPECIAL_TOKENS,
            special_tokens: None,
            special_token_decoding: SpecialTokenDecoding::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_config() {
        let config: TokenizerConfig = serde_json::from_str(
            r#"{"vocab_path": "vocab.json", "num_special_tokens": 1000, "special_token_decoding": "label"}"#,
        )
        .unwrap();

        assert_eq!(PathBuf::from("vocab.json"), config.vocab_path);
        assert_eq!(DEFAULT_VOCAB_SIZE, config.vocab_size);
        assert_eq!(1000, config.num_special_tokens);
        assert_eq!(DEFAULT_VOCAB_SIZE - 1000, config.inner_vocab_size());
        assert_eq!(None, config.special_tokens);
        assert_eq!(SpecialTokenDecoding::Label, config.special_token_decoding);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_json::from_str::<TokenizerConfig>(r#"{"pattern": "v1"}"#).is_err());
    }

    #[test]
    fn decoding_policy_parses() {
        assert_eq!(Ok(SpecialTokenDecoding::Skip), "skip".parse());
        assert_eq!("reject", SpecialTokenDecoding::Reject.to_string());
    }
}
