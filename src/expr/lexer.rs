//! Tokenizer for filter expressions.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::expr::CompileError;

/// Call-style keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Contains,
    ContainsAll,
    ContainsAny,
    ArrayLength,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// String literal with escapes already processed.
    Str(String),
    Identifier(String),
    /// `field["key"][0]`, kept verbatim.
    JsonIdentifier(String),
    Call(CallKind),
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    And,
    Or,
    Not,
    In,
    NotIn,
    Like,
    Exists,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eof,
}

/// A token and the byte range it covers in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Splits a filter string into tokens.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    /// Tokenize the whole input. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(start, ch)) = self.chars.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    start: self.source.len(),
                    end: self.source.len(),
                });
                return Ok(tokens);
            };

            let kind = if ch.is_ascii_digit()
                || (ch == '.' && self.peek_second().is_some_and(|c| c.is_ascii_digit()))
            {
                self.read_number(start)?
            } else if ch == '"' || ch == '\'' {
                TokenKind::Str(self.read_string(start)?)
            } else if ch.is_alphabetic() || ch == '_' || ch == '$' {
                self.read_word(start)?
            } else {
                self.read_operator(start, ch)?
            };

            let end = self.position();
            tokens.push(Token { kind, start, end });
        }
    }

    fn position(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn peek_second(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, c)| c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn next_is(&mut self, expected: char) -> bool {
        if self.chars.peek().is_some_and(|&(_, c)| c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn read_operator(&mut self, start: usize, ch: char) -> Result<TokenKind, CompileError> {
        self.chars.next();
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '+' => TokenKind::Add,
            '-' => TokenKind::Sub,
            '/' => TokenKind::Div,
            '%' => TokenKind::Mod,
            '^' => TokenKind::BitXor,
            '~' => TokenKind::BitNot,
            '*' if self.next_is('*') => TokenKind::Pow,
            '*' => TokenKind::Mul,
            '<' if self.next_is('=') => TokenKind::Le,
            '<' if self.next_is('<') => TokenKind::Shl,
            '<' => TokenKind::Lt,
            '>' if self.next_is('=') => TokenKind::Ge,
            '>' if self.next_is('>') => TokenKind::Shr,
            '>' => TokenKind::Gt,
            '=' if self.next_is('=') => TokenKind::Eq,
            '!' if self.next_is('=') => TokenKind::Ne,
            '!' => TokenKind::Not,
            '&' if self.next_is('&') => TokenKind::And,
            '&' => TokenKind::BitAnd,
            '|' if self.next_is('|') => TokenKind::Or,
            '|' => TokenKind::BitOr,
            _ => {
                return Err(CompileError::new(format!(
                    "unexpected character '{ch}' at position {start}"
                )));
            }
        };
        Ok(kind)
    }

    fn read_number(&mut self, start: usize) -> Result<TokenKind, CompileError> {
        let mut end = start;
        let mut is_float = false;
        let mut prev = '\0';
        while let Some(&(i, ch)) = self.chars.peek() {
            let accept = ch.is_ascii_alphanumeric()
                || ch == '.'
                || ch == '_'
                || ((ch == '+' || ch == '-') && matches!(prev, 'e' | 'E') && !self.is_radix_literal(start));
            if !accept {
                break;
            }
            if ch == '.' || ((ch == 'e' || ch == 'E') && !self.is_radix_literal(start)) {
                is_float = true;
            }
            prev = ch;
            end = i + ch.len_utf8();
            self.chars.next();
        }

        let text = &self.source[start..end];
        let invalid = || CompileError::new(format!("invalid number literal '{text}'"));
        if is_float {
            return text
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| invalid());
        }

        let lower = text.to_ascii_lowercase();
        let parsed = if let Some(hex) = lower.strip_prefix("0x") {
            i64::from_str_radix(hex, 16)
        } else if let Some(bin) = lower.strip_prefix("0b") {
            i64::from_str_radix(bin, 2)
        } else if lower.len() > 1 && lower.starts_with('0') {
            i64::from_str_radix(&lower[1..], 8)
        } else {
            lower.parse::<i64>()
        };
        parsed.map(TokenKind::Integer).map_err(|_| invalid())
    }

    fn is_radix_literal(&self, start: usize) -> bool {
        let rest = &self.source[start..];
        rest.starts_with("0x") || rest.starts_with("0X")
    }

    fn read_string(&mut self, start: usize) -> Result<String, CompileError> {
        let Some((_, quote)) = self.chars.next() else {
            return Err(CompileError::new("unterminated string literal"));
        };
        let mut raw = String::new();
        let mut escaped = false;
        for (_, ch) in self.chars.by_ref() {
            if escaped {
                raw.push('\\');
                raw.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                return unescape(&raw);
            } else {
                raw.push(ch);
            }
        }
        Err(CompileError::new(format!(
            "unterminated string literal starting at position {start}"
        )))
    }

    fn read_word(&mut self, start: usize) -> Result<TokenKind, CompileError> {
        let mut end = start;
        while let Some(&(i, ch)) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' || (ch == '$' && i == start) {
                end = i + ch.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        let word = &self.source[start..end];

        let keyword = match word {
            "and" | "AND" => Some(TokenKind::And),
            "or" | "OR" => Some(TokenKind::Or),
            "in" | "IN" => Some(TokenKind::In),
            "like" | "LIKE" => Some(TokenKind::Like),
            "exists" | "EXISTS" => Some(TokenKind::Exists),
            "true" | "True" | "TRUE" => Some(TokenKind::Bool(true)),
            "false" | "False" | "FALSE" => Some(TokenKind::Bool(false)),
            "json_contains" | "JSON_CONTAINS" | "array_contains" | "ARRAY_CONTAINS" => {
                Some(TokenKind::Call(CallKind::Contains))
            }
            "json_contains_all" | "JSON_CONTAINS_ALL" | "array_contains_all"
            | "ARRAY_CONTAINS_ALL" => Some(TokenKind::Call(CallKind::ContainsAll)),
            "json_contains_any" | "JSON_CONTAINS_ANY" | "array_contains_any"
            | "ARRAY_CONTAINS_ANY" => Some(TokenKind::Call(CallKind::ContainsAny)),
            "array_length" | "ARRAY_LENGTH" => Some(TokenKind::Call(CallKind::ArrayLength)),
            "not" | "NOT" => Some(self.not_or_not_in(word)),
            _ => None,
        };
        if let Some(kind) = keyword {
            return Ok(kind);
        }

        if word.starts_with('$') && word != "$meta" {
            return Err(CompileError::new(format!("invalid identifier '{word}'")));
        }
        if self.chars.peek().is_some_and(|&(_, c)| c == '[') {
            self.read_json_suffix(start)
        } else {
            Ok(TokenKind::Identifier(word.to_string()))
        }
    }

    /// `not` directly followed by `in` (same case family) is a single token.
    fn not_or_not_in(&mut self, word: &str) -> TokenKind {
        let mut lookahead = self.chars.clone();
        let mut saw_space = false;
        while let Some(&(_, c)) = lookahead.peek() {
            if c.is_whitespace() {
                saw_space = true;
                lookahead.next();
            } else {
                break;
            }
        }
        let rest: String = lookahead.clone().take(3).map(|(_, c)| c).collect();
        let expected = if word == "NOT" { "IN" } else { "in" };
        let boundary = rest
            .chars()
            .nth(2)
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if saw_space && rest.starts_with(expected) && boundary {
            lookahead.next();
            lookahead.next();
            self.chars = lookahead;
            TokenKind::NotIn
        } else {
            TokenKind::Not
        }
    }

    fn read_json_suffix(&mut self, start: usize) -> Result<TokenKind, CompileError> {
        while self.chars.peek().is_some_and(|&(_, c)| c == '[') {
            self.chars.next();
            match self.chars.peek().map(|&(_, c)| c) {
                Some(q @ ('"' | '\'')) => {
                    self.chars.next();
                    let mut escaped = false;
                    let mut closed = false;
                    for (_, ch) in self.chars.by_ref() {
                        if escaped {
                            escaped = false;
                        } else if ch == '\\' {
                            escaped = true;
                        } else if ch == q {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(CompileError::new("unterminated key in nested path"));
                    }
                }
                _ => {
                    while self.chars.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
                        self.chars.next();
                    }
                }
            }
            if !self.next_is(']') {
                let text = &self.source[start..self.position()];
                return Err(CompileError::new(format!("invalid nested path '{text}'")));
            }
        }
        let end = self.position();
        Ok(TokenKind::JsonIdentifier(self.source[start..end].to_string()))
    }
}

/// Process backslash escapes. Escapes the string grammar does not know
/// (such as `\%` in LIKE patterns) keep their backslash.
pub fn unescape(raw: &str) -> Result<String, CompileError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '\'' | '"' | '/')) => out.push(c),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| CompileError::new(format!("invalid unicode escape \\u{hex}")))?;
                out.push(code);
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}
