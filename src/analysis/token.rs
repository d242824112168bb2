//! Token types for text analysis.

/// A single token produced by an analyzer.
///
/// `start_offset` doubles as the token's position in posting lists.
///
/// ```
/// use tessera::analysis::Token;
///
/// let token = Token::new("world", 6, 11);
/// assert_eq!(token.text, "world");
/// assert_eq!(token.len(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The term text.
    pub text: String,
    /// Byte offset of the first byte of the token in the input.
    pub start_offset: usize,
    /// Byte offset one past the last byte of the token in the input.
    pub end_offset: usize,
}

impl Token {
    /// Create a new token.
    pub fn new<S: Into<String>>(text: S, start_offset: usize, end_offset: usize) -> Self {
        Token {
            text: text.into(),
            start_offset,
            end_offset,
        }
    }

    /// Length of the token's span in the input.
    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    /// Whether the token spans no input.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A stream of tokens produced by one `analyze` call.
pub type TokenStream = Box<dyn Iterator<Item = Token>>;
