//! Token counting backends.

use tiktoken_rs::CoreBPE;

/// Counts and locates tokens for the chunker.
///
/// Implementations may return an error or panic on input they cannot
/// encode; the chunker guards every call.
pub trait Tokenizer: Send + Sync {
    fn name(&self) -> &str;

    fn count_tokens(&self, text: &str) -> anyhow::Result<usize>;

    /// Byte offset in `text` where each token ends, strictly increasing.
    ///
    /// Offsets may fall inside a multi-byte character when a token covers
    /// part of one. The length of the result is the token count of `text`.
    fn token_ends(&self, text: &str) -> anyhow::Result<Vec<usize>>;
}

/// OpenAI `cl100k_base` encoding.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn cl100k() -> anyhow::Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        "cl100k_base"
    }

    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
        Ok(self.bpe.encode_ordinary(text).len())
    }

    fn token_ends(&self, text: &str) -> anyhow::Result<Vec<usize>> {
        let tokens = self.bpe.encode_ordinary(text);
        let mut ends = Vec::with_capacity(tokens.len());
        let mut offset = 0;
        for bytes in self.bpe._decode_native_and_split(tokens) {
            offset += bytes.len();
            ends.push(offset);
        }
        anyhow::ensure!(
            offset == text.len(),
            "decoded {} bytes from {} bytes of input",
            offset,
            text.len()
        );
        Ok(ends)
    }
}

/// Fixed characters-per-token estimate. Never fails.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTokenizer {
    pub chars_per_token: usize,
}

impl Default for ApproxTokenizer {
    fn default() -> Self {
        Self {
            chars_per_token: super::DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl Tokenizer for ApproxTokenizer {
    fn name(&self) -> &str {
        "approximate"
    }

    fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
        Ok(super::estimate_tokens(text.chars().count(), self.chars_per_token))
    }

    fn token_ends(&self, text: &str) -> anyhow::Result<Vec<usize>> {
        let per = self.chars_per_token.max(1);
        let mut ends: Vec<usize> = text
            .char_indices()
            .skip(per)
            .step_by(per)
            .map(|(i, _)| i)
            .collect();
        if !text.is_empty() {
            ends.push(text.len());
        }
        Ok(ends)
    }
}
