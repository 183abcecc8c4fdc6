//! LIKE pattern classification.

use crate::expr::typed::CompareOp;

fn is_wildcard(c: char) -> bool {
    c == '%' || c == '_'
}

/// Lower a LIKE pattern to the cheapest string operator that matches it.
///
/// A pattern without unescaped wildcards becomes `Equal`, one whose only
/// wildcards form a trailing run becomes `PrefixMatch` on the part before
/// that run, and anything else is a general `Match` on the raw pattern.
pub fn translate_pattern_match(pattern: &str) -> (CompareOp, String) {
    let chars: Vec<char> = pattern.chars().collect();
    if chars.is_empty() {
        return (CompareOp::Equal, String::new());
    }

    // Index just past the last char that is not part of the trailing
    // wildcard run. An escaped wildcard ends the run.
    let mut keep = chars.len();
    while keep > 0 && is_wildcard(chars[keep - 1]) {
        if keep >= 2 && chars[keep - 2] == '\\' {
            break;
        }
        keep -= 1;
    }

    if keep == 0 {
        return (CompareOp::PrefixMatch, String::new());
    }

    let prefix = &chars[..keep];
    if has_wildcards(prefix) {
        return (CompareOp::Match, pattern.to_string());
    }

    let literal = unescape_wildcards(prefix);
    if keep == chars.len() {
        (CompareOp::Equal, literal)
    } else {
        (CompareOp::PrefixMatch, literal)
    }
}

/// True if `chars` holds a `%` or `_` that is not preceded by a backslash.
fn has_wildcards(chars: &[char]) -> bool {
    chars
        .iter()
        .enumerate()
        .any(|(i, &c)| is_wildcard(c) && (i == 0 || chars[i - 1] != '\\'))
}

/// Drop the backslash in front of escaped wildcards.
fn unescape_wildcards(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() && is_wildcard(chars[i + 1]) {
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}
