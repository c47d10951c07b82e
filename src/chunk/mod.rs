//! Token-bounded splitting of file content.
//!
//! [`ContentChunker::split`] cuts text into pieces of at most `max_tokens`
//! tokens as counted by a [`Tokenizer`]. Cuts fall on line ends where
//! possible, then on whitespace, then on any character boundary. Every
//! tokenizer call is guarded: an error or panic switches the whole file to a
//! characters-per-token estimate, as does content with very long lines.
//! Either way, concatenating the chunks in
//! order gives back the input exactly.

mod tokenizer;

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use tracing::warn;

pub use tokenizer::{ApproxTokenizer, TiktokenTokenizer, Tokenizer};

pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Content above this size skips the tokenizer.
pub const DEFAULT_MAX_EXACT_BYTES: usize = 2 * 1024 * 1024;

/// Content with a line longer than this skips the tokenizer. Byte-pair
/// merging is quadratic in the length of a run without whitespace, so
/// minified or encoded blobs stall exact counting.
pub const DEFAULT_MAX_EXACT_LINE: usize = 16 * 1024;

/// One piece of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// 1-based position.
    pub index: usize,
    pub total: usize,
    pub content: String,
    pub tokens: usize,
    /// Set when boundaries and counts come from the estimate.
    pub approximate: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkerOptions {
    pub chars_per_token: usize,
    pub max_exact_bytes: usize,
    pub max_exact_line: usize,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            max_exact_bytes: DEFAULT_MAX_EXACT_BYTES,
            max_exact_line: DEFAULT_MAX_EXACT_LINE,
        }
    }
}

/// The tokenizer failed; the reason has already been logged.
#[derive(Debug)]
struct TokenizerFault(String);

pub struct ContentChunker<'a> {
    tokenizer: Option<&'a dyn Tokenizer>,
    options: ChunkerOptions,
}

impl<'a> ContentChunker<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer) -> Self {
        Self {
            tokenizer: Some(tokenizer),
            options: ChunkerOptions::default(),
        }
    }

    /// A chunker that always uses the estimate.
    pub fn approximate() -> Self {
        Self {
            tokenizer: None,
            options: ChunkerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChunkerOptions) -> Self {
        self.options = options;
        self
    }

    /// Split `content` into chunks of at most `max_tokens` tokens.
    pub fn split(&self, content: &str, max_tokens: usize) -> Vec<Chunk> {
        self.split_named(content, max_tokens, "<input>")
    }

    /// Like [`split`](Self::split); `name` identifies the content in logs.
    pub fn split_named(&self, content: &str, max_tokens: usize, name: &str) -> Vec<Chunk> {
        let max_tokens = max_tokens.max(1);
        if content.is_empty() {
            return vec![Chunk {
                index: 1,
                total: 1,
                content: String::new(),
                tokens: 0,
                approximate: false,
            }];
        }

        let pieces = match self.tokenizer {
            Some(_) if content.len() > self.options.max_exact_bytes => {
                warn!(
                    file = name,
                    bytes = content.len(),
                    "content too large for exact token counting, using estimate"
                );
                None
            }
            Some(_) if longest_line(content) > self.options.max_exact_line => {
                warn!(
                    file = name,
                    longest_line = longest_line(content),
                    "line too long for exact token counting, using estimate"
                );
                None
            }
            Some(tokenizer) => match ExactSplitter::new(tokenizer, max_tokens).split(content) {
                Ok(pieces) => Some(pieces),
                Err(TokenizerFault(reason)) => {
                    warn!(
                        file = name,
                        tokenizer = tokenizer.name(),
                        reason = %reason,
                        "tokenizer failed, using approximate chunk boundaries"
                    );
                    None
                }
            },
            None => None,
        };

        match pieces {
            Some(pieces) => number(pieces, false),
            None => number(
                approximate_split(content, max_tokens, self.options.chars_per_token),
                true,
            ),
        }
    }
}

fn number(pieces: Vec<(String, usize)>, approximate: bool) -> Vec<Chunk> {
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (content, tokens))| Chunk {
            index: i + 1,
            total,
            content,
            tokens,
            approximate,
        })
        .collect()
}

pub(crate) fn estimate_tokens(chars: usize, chars_per_token: usize) -> usize {
    let per = chars_per_token.max(1);
    (chars + per - 1) / per
}

struct ExactSplitter<'t> {
    tokenizer: &'t dyn Tokenizer,
    max_tokens: usize,
}

impl<'t> ExactSplitter<'t> {
    fn new(tokenizer: &'t dyn Tokenizer, max_tokens: usize) -> Self {
        Self {
            tokenizer,
            max_tokens,
        }
    }

    fn guard<T>(&self, call: impl FnOnce(&dyn Tokenizer) -> anyhow::Result<T>) -> Result<T, TokenizerFault> {
        let tokenizer = self.tokenizer;
        match catch_unwind(AssertUnwindSafe(|| call(tokenizer))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TokenizerFault(e.to_string())),
            Err(payload) => Err(TokenizerFault(format!(
                "tokenizer panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    fn count(&self, text: &str) -> Result<usize, TokenizerFault> {
        self.guard(|t| t.count_tokens(text))
    }

    /// Encode once, then walk windows of `max_tokens` token ends. Each
    /// window is pulled back to a line end or whitespace when that keeps
    /// more than half of it, and shrunk by the overflow if the piece counts
    /// higher on its own. A single character is never split even if it
    /// alone exceeds the budget.
    fn split(&self, content: &str) -> Result<Vec<(String, usize)>, TokenizerFault> {
        let ends = self.guard(|t| t.token_ends(content))?;
        if ends.len() <= self.max_tokens {
            return Ok(vec![(content.to_string(), ends.len())]);
        }

        let mut out = Vec::new();
        let mut start = 0;
        let mut consumed = 0;

        while start < content.len() {
            while consumed < ends.len() && ends[consumed] <= start {
                consumed += 1;
            }
            let mut hi = (consumed + self.max_tokens).min(ends.len());
            let mut cut = if hi == ends.len() {
                content.len()
            } else {
                prefer_boundary(content, start, floor_boundary(content, ends[hi - 1]))
            };
            if cut <= start {
                cut = next_boundary(content, start);
            }

            loop {
                let piece = &content[start..cut];
                let tokens = self.count(piece)?;
                if tokens <= self.max_tokens || cut == next_boundary(content, start) {
                    out.push((piece.to_string(), tokens));
                    break;
                }
                hi = hi.saturating_sub(tokens - self.max_tokens);
                let shrunk = if hi > consumed { ends[hi - 1] } else { start };
                cut = floor_boundary(content, shrunk.min(cut - 1)).max(next_boundary(content, start));
            }
            start = cut;
        }
        Ok(out)
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Largest char boundary at or below `i`.
fn floor_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// End of the character starting at `start`.
fn next_boundary(s: &str, start: usize) -> usize {
    start + s[start..].chars().next().map_or(0, char::len_utf8)
}

/// Pull `cut` back to just after a newline, else after whitespace, when
/// that keeps more than half of `start..cut`.
fn prefer_boundary(content: &str, start: usize, cut: usize) -> usize {
    let window = &content[start..cut];
    let half = window.len() / 2;
    let after = |i: usize| i + window[i..].chars().next().map_or(1, char::len_utf8);

    if let Some(nl) = window.rfind('\n') {
        if nl + 1 > half {
            return start + nl + 1;
        }
    }
    if let Some(ws) = window.rfind(char::is_whitespace) {
        let keep = after(ws);
        if keep > half {
            return start + keep;
        }
    }
    cut
}

/// Length in bytes of the longest line.
fn longest_line(content: &str) -> usize {
    content.split('\n').map(str::len).max().unwrap_or(0)
}

/// Character windows of `max_tokens * chars_per_token`, cut after the last
/// newline in the window when that is past its midpoint.
fn approximate_split(content: &str, max_tokens: usize, chars_per_token: usize) -> Vec<(String, usize)> {
    let per = chars_per_token.max(1);
    let window = max_tokens.saturating_mul(per).max(1);
    let mut out = Vec::new();
    let mut rest = content;

    while !rest.is_empty() {
        let end = match rest.char_indices().nth(window) {
            Some((i, _)) => i,
            None => {
                out.push((rest.to_string(), estimate_tokens(rest.chars().count(), per)));
                break;
            }
        };

        let mut cut = end;
        if let Some(nl) = rest[..end].rfind('\n') {
            if nl + 1 > end / 2 {
                cut = nl + 1;
            }
        }

        let (head, tail) = rest.split_at(cut);
        out.push((head.to_string(), estimate_tokens(head.chars().count(), per)));
        rest = tail;
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// End of each word plus the whitespace after it.
    fn word_ends(text: &str) -> Vec<usize> {
        let mut ends = Vec::new();
        let mut in_word = false;
        for (i, c) in text.char_indices() {
            if c.is_whitespace() {
                in_word = false;
            } else if !in_word {
                if let Some(last) = ends.last_mut() {
                    *last = i;
                }
                ends.push(i + c.len_utf8());
                in_word = true;
            } else {
                *ends.last_mut().unwrap() = i + c.len_utf8();
            }
        }
        if let Some(last) = ends.last_mut() {
            *last = text.len();
        }
        ends
    }

    /// One token per whitespace-separated word.
    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn name(&self) -> &str {
            "words"
        }

        fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
            Ok(text.split_whitespace().count())
        }

        fn token_ends(&self, text: &str) -> anyhow::Result<Vec<usize>> {
            Ok(word_ends(text))
        }
    }

    /// Word tokenizer that records how often each method runs.
    #[derive(Default)]
    struct CountingTokenizer {
        counts: AtomicUsize,
        encodes: AtomicUsize,
    }

    impl Tokenizer for CountingTokenizer {
        fn name(&self) -> &str {
            "counting"
        }

        fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
            self.counts.fetch_add(1, Ordering::SeqCst);
            Ok(text.split_whitespace().count())
        }

        fn token_ends(&self, text: &str) -> anyhow::Result<Vec<usize>> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            Ok(word_ends(text))
        }
    }

    /// Panics on NUL bytes, like a native encoder hitting bad input.
    struct PanickyTokenizer;

    impl Tokenizer for PanickyTokenizer {
        fn name(&self) -> &str {
            "panicky"
        }

        fn count_tokens(&self, text: &str) -> anyhow::Result<usize> {
            if text.contains('\0') {
                panic!("cannot encode control character");
            }
            Ok(text.len())
        }

        fn token_ends(&self, text: &str) -> anyhow::Result<Vec<usize>> {
            if text.contains('\0') {
                panic!("cannot encode control character");
            }
            Ok((1..=text.len()).collect())
        }
    }

    struct FailingTokenizer;

    impl Tokenizer for FailingTokenizer {
        fn name(&self) -> &str {
            "failing"
        }

        fn count_tokens(&self, _text: &str) -> anyhow::Result<usize> {
            anyhow::bail!("vocabulary not loaded")
        }

        fn token_ends(&self, _text: &str) -> anyhow::Result<Vec<usize>> {
            anyhow::bail!("vocabulary not loaded")
        }
    }

    fn joined(chunks: &[Chunk]) -> String {
        chunks.iter().map(|c| c.content.as_str()).collect()
    }

    #[test]
    fn test_empty_content_single_chunk() {
        let chunks = ContentChunker::new(&WordTokenizer).split("", 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "");
        assert_eq!((chunks[0].index, chunks[0].total), (1, 1));
    }

    #[test]
    fn test_small_content_single_chunk() {
        let chunks = ContentChunker::new(&WordTokenizer).split("one two\nthree\n", 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tokens, 3);
        assert!(!chunks[0].approximate);
    }

    #[test]
    fn test_splits_on_lines_within_budget() {
        let content = "a b c\nd e\nf g h i\nj\n";
        let chunks = ContentChunker::new(&WordTokenizer).split(content, 5);
        assert_eq!(joined(&chunks), content);
        assert!(chunks.iter().all(|c| c.tokens <= 5));
        assert_eq!(chunks[0].content, "a b c\nd e\n");
        assert_eq!(chunks.last().unwrap().total, chunks.len());
    }

    #[test]
    fn test_oversized_line_is_split() {
        let content = "w ".repeat(25);
        let chunks = ContentChunker::new(&WordTokenizer).split(&content, 10);
        assert_eq!(joined(&chunks), content);
        assert!(chunks.iter().all(|c| c.tokens <= 10));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_panicking_tokenizer_falls_back() {
        let content = format!("{}\0{}", "x".repeat(50), "y".repeat(50));
        let chunks = ContentChunker::new(&PanickyTokenizer).split(&content, 10);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.approximate));
        assert_eq!(joined(&chunks), content);
        // 101 chars at 4 chars per token, 40-char windows
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_erroring_tokenizer_falls_back() {
        let chunks = ContentChunker::new(&FailingTokenizer).split("abc\ndef\n", 1);
        assert!(chunks.iter().all(|c| c.approximate));
        assert_eq!(joined(&chunks), "abc\ndef\n");
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_large_content_skips_tokenizer() {
        let chunker = ContentChunker::new(&PanickyTokenizer).with_options(ChunkerOptions {
            chars_per_token: 4,
            max_exact_bytes: 16,
            ..Default::default()
        });
        let chunks = chunker.split("0123456789abcdefghij", 100);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].approximate);
    }

    #[test]
    fn test_approximate_prefers_newlines() {
        let content = "aaaaaaa\nbbbbbbbbbbbbbbbbbbbb";
        let pieces = approximate_split(content, 3, 4);
        assert_eq!(pieces[0].0, "aaaaaaa\n");
        let rebuilt: String = pieces.iter().map(|p| p.0.as_str()).collect();
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_zero_budget_is_clamped() {
        let chunks = ContentChunker::approximate().split("abcdefgh", 0);
        assert_eq!(joined(&chunks), "abcdefgh");
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_multibyte_content_stays_on_char_boundaries() {
        let content = "héllo wörld ünïcode ".repeat(10);
        let chunks = ContentChunker::new(&PanickyTokenizer).split(&content, 7);
        assert_eq!(joined(&chunks), content);
        assert!(chunks.iter().all(|c| c.tokens <= 7 || c.content.chars().count() == 1));
    }

    #[test]
    fn test_word_ends_cover_text() {
        assert_eq!(word_ends("a b c\nd e\n"), vec![2, 4, 6, 8, 10]);
        assert_eq!(word_ends("  lead"), vec![6]);
        assert!(word_ends("   ").is_empty());
    }

    #[test]
    fn test_long_line_skips_tokenizer() {
        let tokenizer = CountingTokenizer::default();
        let chunker = ContentChunker::new(&tokenizer).with_options(ChunkerOptions {
            max_exact_line: 64,
            ..Default::default()
        });
        let content = format!("short\n{}\nshort\n", "x".repeat(65));
        let chunks = chunker.split(&content, 4);

        assert!(chunks.iter().all(|c| c.approximate));
        assert_eq!(joined(&chunks), content);
        assert_eq!(tokenizer.encodes.load(Ordering::SeqCst), 0);
        assert_eq!(tokenizer.counts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_content_is_encoded_once() {
        let tokenizer = CountingTokenizer::default();
        let content = "alpha beta gamma delta\n".repeat(200);
        let chunks = ContentChunker::new(&tokenizer).split(&content, 10);

        assert_eq!(joined(&chunks), content);
        assert_eq!(tokenizer.encodes.load(Ordering::SeqCst), 1);
        // one verification count per chunk
        assert_eq!(tokenizer.counts.load(Ordering::SeqCst), chunks.len());
        assert!(chunks.iter().all(|c| c.tokens <= 10 && !c.approximate));
        assert_eq!(chunks[0].content, "alpha beta gamma delta\n".repeat(2));
    }
}
