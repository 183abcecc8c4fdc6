//! Token filters transform a token stream.

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for filters that transform token streams.
pub trait Filter: Send + Sync {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    fn name(&self) -> &'static str;
}

pub mod lowercase;

pub use lowercase::LowercaseFilter;
