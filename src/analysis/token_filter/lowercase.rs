//! Lowercase filter.
//!
//! # Examples
//!
//! ```
//! use vecnode::analysis::token::Token;
//! use vecnode::analysis::token_filter::{Filter, LowercaseFilter};
//!
//! let tokens = vec![Token::new("Hello", 0), Token::new("WORLD", 1)];
//! let filtered: Vec<_> = LowercaseFilter::new()
//!     .filter(Box::new(tokens.into_iter()))
//!     .unwrap()
//!     .collect();
//! assert_eq!(filtered[1].text, "world");
//! ```

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// Converts token text to lowercase.
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        Ok(Box::new(tokens.map(|token| {
            if token.text.is_ascii() {
                let lower = token.text.to_ascii_lowercase();
                token.with_text(lower)
            } else {
                let lower = token.text.to_lowercase();
                token.with_text(lower)
            }
        })))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}
