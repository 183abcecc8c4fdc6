//! Analyzer pipelines built from `analyzer_params`.
//!
//! A text field feeding a BM25 function may carry an `analyzer_params` type
//! param holding JSON such as
//!
//! ```json
//! {"tokenizer": "whitespace", "filter": ["lowercase"]}
//! ```
//!
//! or the shorthand `{"type": "standard"}`. Missing or empty params select
//! the standard analyzer: Unicode word boundaries followed by lowercasing.
//!
//! # Examples
//!
//! ```
//! use vecnode::analysis::analyzer::Analyzer;
//!
//! let analyzer = Analyzer::from_params(r#"{"tokenizer": "whitespace"}"#).unwrap();
//! assert_eq!(analyzer.terms("Foo bar").unwrap(), vec!["Foo", "bar"]);
//!
//! let standard = Analyzer::from_params("").unwrap();
//! assert_eq!(standard.terms("Foo, bar!").unwrap(), vec!["foo", "bar"]);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::{Filter, LowercaseFilter};
use crate::analysis::tokenizer::{
    RegexTokenizer, Tokenizer, UnicodeWordTokenizer, WhitespaceTokenizer,
};
use crate::error::{Result, VecnodeError};

/// Tokenizer selection inside `analyzer_params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenizerParams {
    /// `"standard"`, `"whitespace"`.
    Named(String),
    /// `{"type": "regex", "pattern": "..."}`.
    Regex {
        #[serde(rename = "type")]
        kind: String,
        pattern: String,
    },
}

/// Parsed form of the `analyzer_params` JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerParams {
    /// Preset analyzer name; mutually exclusive with `tokenizer`.
    #[serde(rename = "type")]
    pub analyzer_type: Option<String>,
    pub tokenizer: Option<TokenizerParams>,
    pub filter: Vec<String>,
}

impl AnalyzerParams {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(AnalyzerParams::default());
        }
        serde_json::from_str(raw).map_err(|e| {
            VecnodeError::parameter_invalid(format!("invalid analyzer params {raw}: {e}"))
        })
    }
}

/// A tokenizer followed by a chain of filters.
#[derive(Clone)]
pub struct Analyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
    name: String,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field(
                "filters",
                &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::standard()
    }
}

impl Analyzer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Analyzer {
            name: format!("pipeline_{}", tokenizer.name()),
            tokenizer,
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unicode word tokenizer plus lowercase.
    pub fn standard() -> Self {
        Analyzer::new(Arc::new(UnicodeWordTokenizer::new()))
            .add_filter(Arc::new(LowercaseFilter::new()))
            .with_name("standard")
    }

    /// Build the analyzer described by a raw `analyzer_params` string.
    pub fn from_params(raw: &str) -> Result<Self> {
        Analyzer::from_analyzer_params(&AnalyzerParams::parse(raw)?)
    }

    pub fn from_analyzer_params(params: &AnalyzerParams) -> Result<Self> {
        if let Some(preset) = &params.analyzer_type {
            if params.tokenizer.is_some() {
                return Err(VecnodeError::parameter_invalid(
                    "analyzer params can not set both type and tokenizer",
                ));
            }
            return match preset.as_str() {
                "standard" => Ok(Analyzer::standard()),
                "whitespace" => Ok(Analyzer::new(Arc::new(WhitespaceTokenizer::new()))
                    .with_name("whitespace")),
                other => Err(VecnodeError::parameter_invalid(format!(
                    "unknown analyzer type {other}"
                ))),
            };
        }

        let Some(tokenizer_params) = &params.tokenizer else {
            if params.filter.is_empty() {
                return Ok(Analyzer::standard());
            }
            return Analyzer::with_filters(
                Analyzer::new(Arc::new(UnicodeWordTokenizer::new())),
                &params.filter,
            );
        };

        let tokenizer: Arc<dyn Tokenizer> = match tokenizer_params {
            TokenizerParams::Named(name) => match name.as_str() {
                "standard" => Arc::new(UnicodeWordTokenizer::new()),
                "whitespace" => Arc::new(WhitespaceTokenizer::new()),
                "regex" => Arc::new(RegexTokenizer::new()?),
                other => {
                    return Err(VecnodeError::parameter_invalid(format!(
                        "unknown tokenizer {other}"
                    )));
                }
            },
            TokenizerParams::Regex { kind, pattern } if kind == "regex" => {
                Arc::new(RegexTokenizer::with_pattern(pattern)?)
            }
            TokenizerParams::Regex { kind, .. } => {
                return Err(VecnodeError::parameter_invalid(format!(
                    "unknown tokenizer {kind}"
                )));
            }
        };
        Analyzer::with_filters(Analyzer::new(tokenizer), &params.filter)
    }

    fn with_filters(mut analyzer: Analyzer, names: &[String]) -> Result<Self> {
        for name in names {
            let filter: Arc<dyn Filter> = match name.as_str() {
                "lowercase" => Arc::new(LowercaseFilter::new()),
                other => {
                    return Err(VecnodeError::parameter_invalid(format!(
                        "unknown token filter {other}"
                    )));
                }
            };
            analyzer = analyzer.add_filter(filter);
        }
        Ok(analyzer)
    }

    pub fn analyze(&self, text: &str) -> Result<TokenStream> {
        let mut tokens = self.tokenizer.tokenize(text)?;
        for filter in &self.filters {
            tokens = filter.filter(tokens)?;
        }
        Ok(tokens)
    }

    /// Token texts of `text`, in order.
    pub fn terms(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.analyze(text)?.map(|token| token.text).collect())
    }
}
