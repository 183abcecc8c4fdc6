//! Regex-based tokenizer.

use std::sync::Arc;

use regex::Regex;

use super::Tokenizer;
use crate::analysis::token::{Token, TokenStream};
use crate::error::{Result, VecnodeError};

/// Extracts every match of a pattern as a token.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    pattern: Arc<Regex>,
}

impl RegexTokenizer {
    /// Tokenizer over `\w+`.
    pub fn new() -> Result<Self> {
        Self::with_pattern(r"\w+")
    }

    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            VecnodeError::parameter_invalid(format!("Invalid regex pattern: {e}"))
        })?;

        Ok(RegexTokenizer {
            pattern: Arc::new(regex),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = self
            .pattern
            .find_iter(text)
            .filter(|mat| !mat.as_str().is_empty())
            .enumerate()
            .map(|(position, mat)| {
                Token::with_offsets(mat.as_str(), position, mat.start(), mat.end())
            })
            .collect();

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}
