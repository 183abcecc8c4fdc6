//! Tokenizers split raw text into tokens.
//!
//! # Examples
//!
//! ```
//! use vecnode::analysis::tokenizer::{Tokenizer, WhitespaceTokenizer};
//!
//! let tokenizer = WhitespaceTokenizer::new();
//! let tokens: Vec<_> = tokenizer.tokenize("Hello world").unwrap().collect();
//! assert_eq!(tokens.len(), 2);
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for tokenizers that convert text into tokens.
///
/// Implementations are stateless, so one instance can be shared across
/// threads and reused for every document.
pub trait Tokenizer: Send + Sync {
    /// Tokenize the given text into a stream of tokens.
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    /// Name used in analyzer params and logs.
    fn name(&self) -> &'static str;
}

pub mod regex;
pub mod unicode_word;
pub mod whitespace;

pub use self::regex::RegexTokenizer;
pub use unicode_word::UnicodeWordTokenizer;
pub use whitespace::WhitespaceTokenizer;
