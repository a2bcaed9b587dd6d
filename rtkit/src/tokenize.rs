//! Tokenization of whole files, processing several files in parallel
use crate::Result;
use anyhow::Context;
use futures::{Stream, StreamExt};
use ranktok::{TokenInt, Tokenizer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::*;

/// A token produced by the tokenizer.
#[derive(Debug, Clone)]
pub struct Token {
    /// The token's id in the tokenizer's vocabulary
    pub integer: TokenInt,

    /// The text of the token, if the token's bytes are valid UTF-8 on their own.  A token that
    /// holds part of a multi-byte character has no text of its own.
    pub original: Option<String>,
}

impl Token {
    fn new(token: TokenInt, tokenizer: &Tokenizer) -> Self {
        let original = match tokenizer.token_piece(token) {
            Some(piece) => match std::str::from_utf8(piece.as_bytes()) {
                Ok(text) => Some(text.to_string()),
                Err(e) => {
                    trace!(err = %e, token, "Token isn't on a UTF-8 boundary");
                    None
                }
            },
            None => None,
        };

        Self {
            integer: token,
            original,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.original {
            Some(text) => write!(f, "{} {text:?}", self.integer),
            None => write!(f, "{} <partial>", self.integer),
        }
    }
}

/// A single token from a file.
#[derive(Debug, Clone)]
pub struct FileToken {
    /// The path of the file that this token came from
    pub path: Arc<PathBuf>,

    /// The byte range within the file that this token comes from.
    ///
    /// If the file wasn't valid UTF-8 these are offsets into the text after invalid bytes were
    /// replaced, not into the original file.
    pub range: Range<u64>,

    /// The token itself
    pub token: Arc<Token>,
}

/// Number of files tokenized at once when the caller doesn't say
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Tokenize one or more files in parallel.
///
/// Up to `parallelism` files are tokenized at the same time.
///
/// The result is a `Stream` that yields the results of tokenizing each file, in a random order.
pub fn tokenize_files_streaming<I, P>(
    tokenizer: Tokenizer,
    files: I,
    parallelism: usize,
) -> impl Stream<Item = Result<(Arc<PathBuf>, Vec<FileToken>)>>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let tokenize_futs = files
        .into_iter()
        .map(move |file| tokenize_file(tokenizer.clone(), file.into()));

    futures::stream::iter(tokenize_futs).buffer_unordered(parallelism.max(1))
}

/// Tokenize one or more files in parallel.
///
/// Wraps [`tokenize_files_streaming`] and doesn't return until all files have been processed
pub async fn tokenize_files<I, P>(
    tokenizer: Tokenizer,
    files: I,
    parallelism: usize,
) -> Vec<Result<(Arc<PathBuf>, Vec<FileToken>)>>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    tokenize_files_streaming(tokenizer, files, parallelism)
        .collect()
        .await
}

/// Tokenize a single file.
///
/// If you need to tokenize multiple files either [`tokenize_files`] or
/// [`tokenize_files_streaming`] will be potentially much more performant.
pub async fn tokenize_file(
    tokenizer: Tokenizer,
    path: impl Into<PathBuf>,
) -> Result<(Arc<PathBuf>, Vec<FileToken>)> {
    let path = path.into();

    let mut file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Error opening '{}'", path.display()))?;
    let metadata = file
        .metadata()
        .await
        .with_context(|| format!("Error reading metadata of '{}'", path.display()))?;
    let mut contents = Vec::with_capacity(metadata.len() as usize);
    file.read_to_end(&mut contents)
        .await
        .with_context(|| format!("Error reading '{}'", path.display()))?;

    let path = Arc::new(path);

    // Encoding is CPU bound; keep it off the async worker threads
    let task_path = path.clone();
    let tokens = tokio::task::spawn_blocking(move || tokenize_bytes(&tokenizer, task_path, &contents))
        .await
        .context("Tokenizing task failed")?;

    Ok((path, tokens))
}

fn tokenize_bytes(tokenizer: &Tokenizer, path: Arc<PathBuf>, contents: &[u8]) -> Vec<FileToken> {
    // The file might or might not be valid Unicode text.  If it contains some invalid Unicode code
    // points, rather than fail the encoding, just substitute them
    let contents = String::from_utf8_lossy(contents);

    if let Cow::Owned(_) = &contents {
        // The input string wasn't entirely valid UTF-8, so the invalid bytes were replaced with a
        // placeholder.  This means the tokenization isn't going to be precisely matching the input
        // file
        warn!(path = %path.display(),
            "Input file did not decode as clean UTF-8.   \
            Invalid bytes have been replaced with a UTF-8 placeholder sequence.   \
            The resulting tokens will not be able to precisely reproduce this file");
    }

    // Store each distinct token once; a file usually repeats a small set of tokens many times.
    // Estimate about one token per 4 bytes, capped at a guess of 64K distinct tokens per file.
    let mut tokens = HashMap::with_capacity(std::cmp::min(contents.len() / 4, u16::MAX as usize));

    tokenizer
        .encode_iter(&contents)
        .scan(0u64, |last_offset, token| {
            let token = tokens
                .entry(token)
                .or_insert_with(|| Arc::new(Token::new(token, tokenizer)))
                .clone();

            let length = tokenizer
                .token_piece(token.integer)
                .map(|piece| piece.as_bytes().len())
                .unwrap_or_default();

            let next_offset = *last_offset + length as u64;
            let range = *last_offset..next_offset;

            *last_offset = next_offset;

            Some(FileToken {
                path: path.clone(),
                range,
                token,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use walkdir::WalkDir;

    const INPUT_DIRECTORY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/test_data/input");

    fn input_files() -> Vec<PathBuf> {
        WalkDir::new(INPUT_DIRECTORY)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    /// Every file in `test_data/input` is tokenized, and the byte ranges of its tokens must cover
    /// the file exactly and slice out each token's own bytes.
    #[tokio::test]
    async fn test_tokenize_files() {
        let tokenizer = test_tokenizer();
        let files = input_files();
        assert!(!files.is_empty());

        let results = tokenize_files(tokenizer.clone(), files.clone(), 2).await;
        assert_eq!(files.len(), results.len());

        for result in results {
            let (path, tokens) = result.unwrap();
            println!("Checking tokens of {}", path.display());
            let contents = std::fs::read(path.as_ref()).unwrap();

            let mut expected_start = 0;
            for file_token in &tokens {
                assert_eq!(expected_start, file_token.range.start);
                assert_eq!(path, file_token.path);
                let piece = tokenizer.token_piece(file_token.token.integer).unwrap();
                let range = file_token.range.start as usize..file_token.range.end as usize;
                assert_eq!(piece.as_bytes(), &contents[range]);
                expected_start = file_token.range.end;
            }
            assert_eq!(contents.len() as u64, expected_start);

            let ids = tokens.iter().map(|t| t.token.integer).collect::<Vec<_>>();
            assert_eq!(String::from_utf8(contents).unwrap(), tokenizer.decode(&ids).unwrap());
        }
    }

    #[tokio::test]
    async fn repeated_tokens_are_shared() {
        let tokenizer = test_tokenizer();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "the the the").unwrap();

        let (_path, tokens) = tokenize_file(tokenizer, file.path()).await.unwrap();

        assert_eq!(3, tokens.len());
        assert!(Arc::ptr_eq(&tokens[1].token, &tokens[2].token));
        assert_eq!(Some(" the"), tokens[1].token.original.as_deref());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let tokenizer = test_tokenizer();

        assert!(tokenize_file(tokenizer, "/no/such/file.txt").await.is_err());
    }

    #[test]
    fn partial_tokens_have_no_text() {
        let tokenizer = test_tokenizer();
        let ids = tokenizer.encode_ordinary("🦀");
        let token = Token::new(ids[0], &tokenizer);

        assert_eq!(None, token.original);
        assert!(token.to_string().ends_with("<partial>"));
    }
}
