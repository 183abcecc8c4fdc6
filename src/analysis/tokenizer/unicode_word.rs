//! Unicode word tokenizer (UAX #29 word boundaries).
//!
//! Punctuation and whitespace segments are dropped. This is the tokenizer
//! behind the `standard` analyzer.
//!
//! # Examples
//!
//! ```
//! use vecnode::analysis::tokenizer::{Tokenizer, UnicodeWordTokenizer};
//!
//! let tokenizer = UnicodeWordTokenizer::new();
//! let tokens: Vec<_> = tokenizer.tokenize("Hello, world! café").unwrap().collect();
//! assert_eq!(tokens[0].text, "Hello");
//! assert_eq!(tokens[2].text, "café");
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

#[derive(Clone, Debug, Default)]
pub struct UnicodeWordTokenizer;

impl UnicodeWordTokenizer {
    pub fn new() -> Self {
        UnicodeWordTokenizer
    }
}

impl Tokenizer for UnicodeWordTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = text
            .unicode_word_indices()
            .enumerate()
            .map(|(position, (start, word))| {
                Token::with_offsets(word, position, start, start + word.len())
            })
            .collect();

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}
