//! Analyzer trait and built-in analyzers.
//!
//! Implementing a custom analyzer:
//!
//! ```
//! use tessera::analysis::{Analyzer, TokenStream};
//! use tessera::error::Result;
//!
//! #[derive(Debug)]
//! struct NothingAnalyzer;
//!
//! impl Analyzer for NothingAnalyzer {
//!     fn analyze(&self, _text: &str) -> Result<TokenStream> {
//!         Ok(Box::new(std::iter::empty()))
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "nothing"
//!     }
//! }
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// Turns field text into tokens.
///
/// Each call returns a fresh, finite stream. An empty stream is valid.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze the given text and return a stream of tokens.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this analyzer.
    fn name(&self) -> &'static str;
}

/// Splits on Unicode word boundaries, keeps words containing at least one
/// alphanumeric character, and lowercases them.
///
/// ```
/// use tessera::analysis::{Analyzer, StandardAnalyzer};
///
/// let tokens: Vec<_> = StandardAnalyzer::new().analyze("Hello, World!").unwrap().collect();
/// assert_eq!(tokens[0].text, "hello");
/// assert_eq!((tokens[1].start_offset, tokens[1].end_offset), (7, 12));
/// ```
#[derive(Clone, Debug, Default)]
pub struct StandardAnalyzer;

impl StandardAnalyzer {
    /// Create a new standard analyzer.
    pub fn new() -> Self {
        StandardAnalyzer
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = text
            .unicode_word_indices()
            .filter(|(_, word)| word.chars().any(|c| c.is_alphanumeric()))
            .map(|(start, word)| Token::new(word.to_lowercase(), start, start + word.len()))
            .collect();

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Splits on whitespace and leaves the text untouched.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceAnalyzer;

impl WhitespaceAnalyzer {
    /// Create a new whitespace analyzer.
    pub fn new() -> Self {
        WhitespaceAnalyzer
    }
}

impl Analyzer for WhitespaceAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        let base = text.as_ptr() as usize;
        let tokens: Vec<Token> = text
            .split_whitespace()
            .map(|word| {
                let start = word.as_ptr() as usize - base;
                Token::new(word, start, start + word.len())
            })
            .collect();

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}
