//! Implementation of components of BPE (byte pair encoding) as it relates to encoding text as
//! tokens.
use crate::encoder::TokenEncoder;
use crate::TokenInt;
use std::ops::Range;

/// Using the BPE algorithm find the tokens in a word and return their ranks.
///
/// `word` must not be empty, and `encoder` must contain all 256 single byte tokens.
pub fn byte_pair_encode(word: &[u8], encoder: &TokenEncoder) -> Vec<TokenInt> {
    // It's assumed that all 256 possible single byte values are also tokens
    if word.len() == 1 {
        return vec![encoder
            .token_for_bytes(word)
            .expect("BUG: expect all possible u8 values to correspond to a token")];
    }

    byte_pair_merge(word, encoder)
        .into_iter()
        .map(|range| {
            encoder
                .token_for_bytes(&word[range])
                .expect("BUG: expect every merged range to already be matched to a token")
        })
        .collect()
}

/// Using the BPE algorithm, find the tokens in a word and return their byte string form.
pub fn byte_pair_split<'a>(word: &'a [u8], encoder: &TokenEncoder) -> Vec<&'a [u8]> {
    if word.len() == 1 {
        return vec![word];
    }

    byte_pair_merge(word, encoder)
        .into_iter()
        .map(|range| &word[range])
        .collect()
}

/// Merge bytes within a word together into progressively fewer, longer byte sequences that
/// correspond to tokens in the vocabulary, returning the byte range of each final token.
///
/// The rank of a token is its merge priority.  The algorithm works by repeatedly merging the
/// adjacent pair whose concatenation has the lowest rank, until no adjacent pair concatenates to
/// a token in the vocabulary.
///
/// Based on the _byte_pair_merge function in the `tiktoken` source.
fn byte_pair_merge(word: &[u8], encoder: &TokenEncoder) -> Vec<Range<usize>> {
    // This is a vector of (start, rank).
    // The rank is of the byte pair starting at position start.
    // The rank of the last item in the vector is not a valid value.
    let mut parts: Vec<(usize, usize)> = (0..word.len() + 1).map(|i| (i, usize::MAX)).collect();

    let get_rank = {
        #[inline(always)]
        |parts: &Vec<(usize, usize)>, start_idx: usize, skip: usize| {
            if (start_idx + skip + 2) < parts.len() {
                encoder.token_for_bytes(&word[parts[start_idx].0..parts[start_idx + skip + 2].0])
            } else {
                None
            }
        }
    };

    // We look up the ranks once in the beginning and iteratively update
    // them during each merge, which reduces the number of rank lookups.
    for i in 0..parts.len() - 2 {
        if let Some(rank) = get_rank(&parts, i, 0) {
            // usize::MAX is a sentinel value and cannot be a valid rank
            debug_assert!(rank != usize::MAX);
            parts[i].1 = rank;
        }
    }

    // If you have n parts and m merges, this does O(mn) work.
    // We could do something with a heap and do O(m log n) work.
    // n is usually small (<100) since it's bounded by the length of a single pre-tokenized word,
    // and at that size the cache locality of a flat vector wins.
    loop {
        if parts.len() == 1 {
            break;
        }

        // usize::MAX is a sentinel rank value allowing us to
        // take the min more quickly
        let mut min_rank: (usize, usize) = (usize::MAX, 0);
        for (i, &(_, rank)) in parts[..parts.len() - 1].iter().enumerate() {
            if rank < min_rank.0 {
                min_rank = (rank, i);
            }
        }

        if min_rank.0 == usize::MAX {
            break;
        }

        let i = min_rank.1;

        // NOTE: We are about to remove parts[i + 1]. We do not do it
        // yet because there are cache-locality benefits to updating
        // parts[i] and parts[i-1] before removing, which could thrash
        // the cache. Thus, we update the rank calculation by skipping over
        // parts[i + 1], by invoking `get_rank` with `skip = 1`.
        parts[i].1 = get_rank(&parts, i, 1).unwrap_or(usize::MAX);
        if i > 0 {
            parts[i - 1].1 = get_rank(&parts, i - 1, 1).unwrap_or(usize::MAX);
        }

        parts.remove(i + 1);
    }

    parts.windows(2).map(|w| w[0].0..w[1].0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(merges: &[&str]) -> TokenEncoder {
        let mut encoder = TokenEncoder::with_capacity(256 + merges.len());
        for b in 0..=255u8 {
            encoder.insert(vec![b], b as usize);
        }
        for (i, merge) in merges.iter().enumerate() {
            encoder.insert(merge.as_bytes().to_vec(), 256 + i);
        }
        encoder
    }

    #[test]
    fn single_bytes_without_merges() {
        let encoder = encoder(&[]);

        assert_eq!(vec![97, 98, 99], byte_pair_encode(b"abc", &encoder));
        assert_eq!(vec![0xff], byte_pair_encode(&[0xff], &encoder));
    }

    #[test]
    fn merges_lowest_rank_first() {
        // "bc" outranks "ab", so "abc" merges the tail first and "ab" is never formed
        let encoder = encoder(&["bc", "ab"]);

        assert_eq!(vec![97, 256], byte_pair_encode(b"abc", &encoder));
        assert_eq!(vec![&b"a"[..], &b"bc"[..]], byte_pair_split(b"abc", &encoder));
    }

    #[test]
    fn merges_repeatedly() {
        let encoder = encoder(&["ab", "cd", "abcd"]);

        assert_eq!(vec![258], byte_pair_encode(b"abcd", &encoder));
        assert_eq!(vec![258, 101], byte_pair_encode(b"abcde", &encoder));
    }

    #[test]
    fn unreachable_token_is_not_produced() {
        // "abc" is in the vocabulary, but no merge sequence reaches it from single bytes
        let encoder = encoder(&["abc"]);

        assert_eq!(vec![97, 98, 99], byte_pair_encode(b"abc", &encoder));
    }
}
