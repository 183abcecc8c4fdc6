//! Tokens flowing through the analysis pipeline.
//!
//! # Examples
//!
//! ```
//! use vecnode::analysis::token::Token;
//!
//! let token = Token::with_offsets("world", 1, 6, 11);
//! assert_eq!(token.text, "world");
//! assert_eq!(token.end_offset - token.start_offset, 5);
//! ```

use serde::{Deserialize, Serialize};

/// A single unit of text produced by a tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token
    pub text: String,

    /// Position of the token in the stream (0-based)
    pub position: usize,

    /// Byte offset where this token starts in the original text
    pub start_offset: usize,

    /// Byte offset just past the end of this token
    pub end_offset: usize,
}

impl Token {
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset: 0,
            end_offset: 0,
        }
    }

    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    /// Same token with new text; offsets still point into the source.
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }
}

/// Boxed stream of tokens.
pub type TokenStream = Box<dyn Iterator<Item = Token> + Send>;
