//! The block of reserved ids at the bottom of the vocabulary used for control tokens.
use crate::encoder::HashMap;
use crate::error::*;
use crate::{Result, TokenInt};
use snafu::ensure;
use tracing::*;

/// Label of the "unknown" token
pub const UNK: &str = "<unk>";

/// Label of the begin-of-sequence token
pub const BOS: &str = "<s>";

/// Label of the end-of-sequence token
pub const EOS: &str = "</s>";

/// The special tokens every vocabulary must have.  When no explicit labels are configured, these
/// are used as-is, in this order.
pub const DEFAULT_SPECIAL_TOKENS: [&str; 3] = [UNK, BOS, EOS];

/// Label given to a reserved id that no explicit label was provided for
pub fn placeholder_label(id: TokenInt) -> String {
    format!("<SPECIAL_{id}>")
}

/// The ordered, distinct labels of the special tokens.  The label at index `i` is the special
/// token with id `i`.
#[derive(Clone, Debug)]
pub struct SpecialTokenTable {
    labels: Vec<String>,
    ids: HashMap<String, TokenInt>,
    unk: TokenInt,
    bos: TokenInt,
    eos: TokenInt,

    /// A/C automaton for finding special token labels in text
    finder: aho_corasick::AhoCorasick,
}

impl SpecialTokenTable {
    /// Build the table from explicit labels, or [`DEFAULT_SPECIAL_TOKENS`] if `labels` is `None`.
    ///
    /// Labels must be distinct, must include the three canonical labels, and there can't be more
    /// of them than `num_special_tokens`, which in turn must be less than `vocab_size`.  Unused
    /// reserved ids get a [`placeholder_label`].
    pub fn new(
        labels: Option<Vec<String>>,
        num_special_tokens: usize,
        vocab_size: usize,
    ) -> Result<Self> {
        let mut labels = labels
            .unwrap_or_else(|| DEFAULT_SPECIAL_TOKENS.iter().map(|s| s.to_string()).collect());

        let mut ids = HashMap::default();
        for (id, label) in labels.iter().enumerate() {
            ensure!(
                ids.insert(label.clone(), id).is_none(),
                DuplicateSpecialTokenSnafu { label }
            );
        }

        ensure!(
            labels.len() <= num_special_tokens && num_special_tokens < vocab_size,
            SpecialTokenCountSnafu {
                labels: labels.len(),
                num_special_tokens,
                vocab_size
            }
        );

        for label in DEFAULT_SPECIAL_TOKENS {
            ensure!(ids.contains_key(label), MissingSpecialTokenSnafu { label });
        }

        let first_placeholder = labels.len();
        for id in first_placeholder..num_special_tokens {
            let label = placeholder_label(id);
            ensure!(
                ids.insert(label.clone(), id).is_none(),
                DuplicateSpecialTokenSnafu { label }
            );
            labels.push(label);
        }
        if first_placeholder < num_special_tokens {
            info!(
                first = %labels[first_placeholder],
                last = %labels[num_special_tokens - 1],
                "Added placeholder special tokens"
            );
        }

        let finder = aho_corasick::AhoCorasickBuilder::new()
            .match_kind(aho_corasick::MatchKind::LeftmostLongest)
            .dfa(true)
            .build(&labels);

        Ok(Self {
            unk: ids[UNK],
            bos: ids[BOS],
            eos: ids[EOS],
            labels,
            ids,
            finder,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, id: TokenInt) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn id_for_label(&self, label: &str) -> Option<TokenInt> {
        self.ids.get(label).copied()
    }

    /// All labels, in id order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn unk(&self) -> TokenInt {
        self.unk
    }

    pub fn bos(&self) -> TokenInt {
        self.bos
    }

    pub fn eos(&self) -> TokenInt {
        self.eos
    }

    /// Find every occurrence of a special token label in `text`, yielding the token's id and the
    /// matched slice.  Where labels overlap, the longest one wins.
    pub fn find_iter<'me, 'text>(
        &'me self,
        text: &'text str,
    ) -> impl Iterator<Item = (TokenInt, &'text str)> + 'text
    where
        'me: 'text,
    {
        self.finder
            .find_iter(text)
            .map(move |m| (m.pattern(), &text[m.start()..m.end()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RanktokError;
    use assert_matches::assert_matches;

    fn labels(labels: &[&str]) -> Option<Vec<String>> {
        Some(labels.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn defaults() {
        let table = SpecialTokenTable::new(None, 3, 1000).unwrap();

        assert_eq!(&["<unk>", "<s>", "</s>"], table.labels());
        assert_eq!((0, 1, 2), (table.unk(), table.bos(), table.eos()));
    }

    #[test]
    fn synthesizes_placeholders() {
        let table = SpecialTokenTable::new(labels(&["<unk>", "<s>", "</s>"]), 5, 1000).unwrap();

        assert_eq!(5, table.len());
        assert_eq!(Some("<SPECIAL_3>"), table.label(3));
        assert_eq!(Some("<SPECIAL_4>"), table.label(4));
        assert_eq!(Some(4), table.id_for_label("<SPECIAL_4>"));
        assert_eq!(None, table.label(5));
    }

    #[test]
    fn ids_follow_label_positions() {
        let table =
            SpecialTokenTable::new(labels(&["<pad>", "</s>", "<s>", "<unk>"]), 4, 1000).unwrap();

        assert_eq!((3, 2, 1), (table.unk(), table.bos(), table.eos()));
    }

    #[test]
    fn rejects_duplicates() {
        assert_matches!(
            SpecialTokenTable::new(labels(&["<unk>", "<s>", "</s>", "<s>"]), 5, 1000),
            Err(RanktokError::DuplicateSpecialToken { label }) if label == "<s>"
        );
    }

    #[test]
    fn rejects_collision_with_placeholder() {
        assert_matches!(
            SpecialTokenTable::new(labels(&["<SPECIAL_4>", "<unk>", "<s>", "</s>"]), 5, 1000),
            Err(RanktokError::DuplicateSpecialToken { label }) if label == "<SPECIAL_4>"
        );
    }

    #[test]
    fn rejects_missing_canonical_label() {
        assert_matches!(
            SpecialTokenTable::new(labels(&["<unk>", "<s>", "<pad>"]), 3, 1000),
            Err(RanktokError::MissingSpecialToken { label }) if label == "</s>"
        );
    }

    #[test]
    fn rejects_bad_counts() {
        assert_matches!(
            SpecialTokenTable::new(None, 2, 1000),
            Err(RanktokError::SpecialTokenCount { .. })
        );
        assert_matches!(
            SpecialTokenTable::new(None, 1000, 1000),
            Err(RanktokError::SpecialTokenCount { .. })
        );
    }

    #[test]
    fn finds_labels_in_text() {
        let table = SpecialTokenTable::new(None, 3, 1000).unwrap();
        let found = table
            .find_iter("<s>hello</s> <unk>")
            .collect::<Vec<_>>();

        assert_eq!(vec![(1, "<s>"), (2, "</s>"), (0, "<unk>")], found);
        assert_eq!(0, table.find_iter("plain text").count());
    }
}
