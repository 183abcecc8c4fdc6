//! Text analysis for BM25 functions.
//!
//! Text flows through a [`tokenizer::Tokenizer`] and then any number of
//! [`token_filter::Filter`]s, wired together by an [`analyzer::Analyzer`].

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

pub use analyzer::{Analyzer, AnalyzerParams};
pub use token::{Token, TokenStream};
