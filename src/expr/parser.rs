//! Recursive-descent parser for filter expressions.
//!
//! Precedence, lowest first: `or`, `and`, `|`, `^`, `&`, equality,
//! relational (with the `a < x < b` range forms), `in`/`not in`, shifts,
//! additive, multiplicative, unary, `**`, then `like` which binds to a
//! primary expression.

use crate::expr::CompileError;
use crate::expr::ast::{BinaryOp, Node, NodeKind, UnaryOp};
use crate::expr::lexer::{CallKind, Lexer, Token, TokenKind};

/// Parse a filter string into a syntax tree.
pub fn parse(source: &str) -> Result<Node, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = FilterParser { tokens, pos: 0 };
    let node = parser.parse_or()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(CompileError::new(format!(
            "unexpected '{}' at position {}",
            source.get(trailing.start..trailing.end).unwrap_or(""),
            trailing.start
        )));
    }
    Ok(node)
}

struct FilterParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl FilterParser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn last_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end
        }
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> Result<Token, CompileError> {
        let token = self.advance();
        if token.kind == expected {
            Ok(token)
        } else {
            Err(CompileError::new(format!(
                "expected {what} at position {}, found {:?}",
                token.start, token.kind
            )))
        }
    }

    fn binary(op: BinaryOp, left: Node, right: Node) -> Node {
        let (start, end) = (left.start, right.end);
        Node::new(
            NodeKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            start,
            end,
        )
    }

    /// Left-associative loop over one precedence level.
    fn parse_level(
        &mut self,
        ops: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Node, CompileError>,
    ) -> Result<Node, CompileError> {
        let mut left = next(self)?;
        while let Some(op) = ops
            .iter()
            .find(|(kind, _)| *kind == self.peek().kind)
            .map(|(_, op)| *op)
        {
            self.advance();
            let right = next(self)?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Node, CompileError> {
        self.parse_level(&[(TokenKind::Or, BinaryOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Node, CompileError> {
        self.parse_level(&[(TokenKind::And, BinaryOp::And)], Self::parse_bit_or)
    }

    fn parse_bit_or(&mut self) -> Result<Node, CompileError> {
        self.parse_level(&[(TokenKind::BitOr, BinaryOp::BitOr)], Self::parse_bit_xor)
    }

    fn parse_bit_xor(&mut self) -> Result<Node, CompileError> {
        self.parse_level(&[(TokenKind::BitXor, BinaryOp::BitXor)], Self::parse_bit_and)
    }

    fn parse_bit_and(&mut self) -> Result<Node, CompileError> {
        self.parse_level(&[(TokenKind::BitAnd, BinaryOp::BitAnd)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Node, CompileError> {
        self.parse_level(
            &[(TokenKind::Eq, BinaryOp::Eq), (TokenKind::Ne, BinaryOp::Ne)],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Node, CompileError> {
        let mut left = self.parse_term()?;
        loop {
            let Some(op) = relational_op(&self.peek().kind) else {
                return Ok(left);
            };
            if let Some(range) = self.try_parse_range(&left, op)? {
                left = range;
                continue;
            }
            self.advance();
            let right = self.parse_term()?;
            left = Self::binary(op, left, right);
        }
    }

    /// `lower op1 column op2 upper` where both operators point the same way.
    fn try_parse_range(&mut self, lower: &Node, op1: BinaryOp) -> Result<Option<Node>, CompileError> {
        let is_column = matches!(
            self.peek_at(1).kind,
            TokenKind::Identifier(_) | TokenKind::JsonIdentifier(_)
        );
        let Some(op2) = relational_op(&self.peek_at(2).kind) else {
            return Ok(None);
        };
        let ascending = |op| matches!(op, BinaryOp::Lt | BinaryOp::Le);
        if !is_column || ascending(op1) != ascending(op2) {
            return Ok(None);
        }

        self.advance();
        let column_token = self.advance();
        let column = match column_token.kind {
            TokenKind::Identifier(name) => NodeKind::Identifier(name),
            TokenKind::JsonIdentifier(name) => NodeKind::JsonIdentifier(name),
            _ => return Ok(None),
        };
        let column = Node::new(column, column_token.start, column_token.end);
        self.advance();
        let upper = self.parse_term()?;

        let reversed = !ascending(op1);
        let (lower_node, upper_node, lower_op, upper_op) = if reversed {
            (upper, lower.clone(), op2, op1)
        } else {
            (lower.clone(), upper, op1, op2)
        };
        let start = lower.start.min(lower_node.start);
        let end = self.last_end();
        Ok(Some(Node::new(
            NodeKind::Range {
                lower: Box::new(lower_node),
                column: Box::new(column),
                upper: Box::new(upper_node),
                lower_inclusive: matches!(lower_op, BinaryOp::Le | BinaryOp::Ge),
                upper_inclusive: matches!(upper_op, BinaryOp::Le | BinaryOp::Ge),
                reversed,
            },
            start,
            end,
        )))
    }

    fn parse_term(&mut self) -> Result<Node, CompileError> {
        let column = self.parse_shift()?;
        let negated = match self.peek().kind {
            TokenKind::In => false,
            TokenKind::NotIn => true,
            _ => return Ok(column),
        };
        self.advance();

        let close = match self.advance().kind {
            TokenKind::LBracket => TokenKind::RBracket,
            TokenKind::LParen => TokenKind::RParen,
            other => {
                return Err(CompileError::new(format!(
                    "expected a value list after 'in', found {other:?}"
                )));
            }
        };
        let values = self.parse_list(close)?;
        let start = column.start;
        Ok(Node::new(
            NodeKind::Term {
                column: Box::new(column),
                values,
                negated,
            },
            start,
            self.last_end(),
        ))
    }

    /// Comma separated expressions up to `close`, which is consumed.
    /// A trailing comma is accepted.
    fn parse_list(&mut self, close: TokenKind) -> Result<Vec<Node>, CompileError> {
        let mut items = Vec::new();
        loop {
            if self.peek().kind == close {
                self.advance();
                return Ok(items);
            }
            items.push(self.parse_or()?);
            match self.advance() {
                Token {
                    kind: TokenKind::Comma,
                    ..
                } => {}
                token if token.kind == close => return Ok(items),
                token => {
                    return Err(CompileError::new(format!(
                        "expected ',' or closing bracket at position {}",
                        token.start
                    )));
                }
            }
        }
    }

    fn parse_shift(&mut self) -> Result<Node, CompileError> {
        self.parse_level(
            &[(TokenKind::Shl, BinaryOp::Shl), (TokenKind::Shr, BinaryOp::Shr)],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Node, CompileError> {
        self.parse_level(
            &[(TokenKind::Add, BinaryOp::Add), (TokenKind::Sub, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Node, CompileError> {
        self.parse_level(
            &[
                (TokenKind::Mul, BinaryOp::Mul),
                (TokenKind::Div, BinaryOp::Div),
                (TokenKind::Mod, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Node, CompileError> {
        let op = match self.peek().kind {
            TokenKind::Add => UnaryOp::Plus,
            TokenKind::Sub => UnaryOp::Minus,
            TokenKind::BitNot => UnaryOp::BitNot,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        let start = self.advance().start;
        let operand = self.parse_unary()?;
        let end = operand.end;
        Ok(Node::new(
            NodeKind::Unary {
                op,
                operand: Box::new(operand),
            },
            start,
            end,
        ))
    }

    fn parse_power(&mut self) -> Result<Node, CompileError> {
        let base = self.parse_like()?;
        if self.peek().kind != TokenKind::Pow {
            return Ok(base);
        }
        self.advance();
        let exponent = self.parse_unary()?;
        Ok(Self::binary(BinaryOp::Pow, base, exponent))
    }

    fn parse_like(&mut self) -> Result<Node, CompileError> {
        let operand = self.parse_primary()?;
        if self.peek().kind != TokenKind::Like {
            return Ok(operand);
        }
        self.advance();
        let token = self.advance();
        let TokenKind::Str(pattern) = token.kind else {
            return Err(CompileError::new(format!(
                "like expects a string pattern at position {}",
                token.start
            )));
        };
        let start = operand.start;
        Ok(Node::new(
            NodeKind::Like {
                operand: Box::new(operand),
                pattern,
            },
            start,
            token.end,
        ))
    }

    fn parse_primary(&mut self) -> Result<Node, CompileError> {
        let token = self.advance();
        let (start, end) = (token.start, token.end);
        let kind = match token.kind {
            TokenKind::Integer(v) => NodeKind::Integer(v),
            TokenKind::Float(v) => NodeKind::Float(v),
            TokenKind::Bool(v) => NodeKind::Bool(v),
            TokenKind::Str(v) => NodeKind::Str(v),
            TokenKind::Identifier(v) => NodeKind::Identifier(v),
            TokenKind::JsonIdentifier(v) => NodeKind::JsonIdentifier(v),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Node::new(inner.kind, start, self.last_end()));
            }
            TokenKind::LBracket => {
                let items = self.parse_list(TokenKind::RBracket)?;
                return Ok(Node::new(NodeKind::Array(items), start, self.last_end()));
            }
            TokenKind::Exists => {
                let operand = self.parse_like()?;
                let end = operand.end;
                return Ok(Node::new(NodeKind::Exists(Box::new(operand)), start, end));
            }
            TokenKind::Call(kind) => {
                self.expect(TokenKind::LParen, "'('")?;
                let args = self.parse_list(TokenKind::RParen)?;
                let arity = if kind == CallKind::ArrayLength { 1 } else { 2 };
                if args.len() != arity {
                    return Err(CompileError::new(format!(
                        "{kind:?} expects {arity} argument(s), got {}",
                        args.len()
                    )));
                }
                return Ok(Node::new(NodeKind::Call { kind, args }, start, self.last_end()));
            }
            TokenKind::Eof => {
                return Err(CompileError::new("unexpected end of expression"));
            }
            other => {
                return Err(CompileError::new(format!(
                    "unexpected {other:?} at position {start}"
                )));
            }
        };
        Ok(Node::new(kind, start, end))
    }
}

fn relational_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Lt => Some(BinaryOp::Lt),
        TokenKind::Le => Some(BinaryOp::Le),
        TokenKind::Gt => Some(BinaryOp::Gt),
        TokenKind::Ge => Some(BinaryOp::Ge),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_op(node: &Node) -> BinaryOp {
        match &node.kind {
            NodeKind::Binary { op, .. } => *op,
            other => panic!("expected binary node, got {other:?}"),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let node = parse("a > 1 or b < 2 and c == 3").unwrap();
        assert_eq!(binary_op(&node), BinaryOp::Or);
        let NodeKind::Binary { right, .. } = &node.kind else {
            unreachable!()
        };
        assert_eq!(binary_op(right), BinaryOp::And);
    }

    #[test]
    fn test_arithmetic_precedence() {
        let node = parse("a + 2 * 3 == 7").unwrap();
        assert_eq!(binary_op(&node), BinaryOp::Eq);
        let NodeKind::Binary { left, .. } = &node.kind else {
            unreachable!()
        };
        assert_eq!(binary_op(left), BinaryOp::Add);
    }

    #[test]
    fn test_power_is_right_associative_over_unary() {
        let node = parse("-2 ** 2").unwrap();
        let NodeKind::Unary { op, operand } = &node.kind else {
            panic!("expected unary")
        };
        assert_eq!(*op, UnaryOp::Minus);
        assert_eq!(binary_op(operand), BinaryOp::Pow);
    }

    #[test]
    fn test_range_forms() {
        let node = parse("1 < a <= 5").unwrap();
        let NodeKind::Range {
            lower_inclusive,
            upper_inclusive,
            reversed,
            ..
        } = node.kind
        else {
            panic!("expected range")
        };
        assert!(!lower_inclusive);
        assert!(upper_inclusive);
        assert!(!reversed);

        let node = parse("10 >= a > 2").unwrap();
        let NodeKind::Range {
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
            reversed,
            ..
        } = node.kind
        else {
            panic!("expected range")
        };
        assert_eq!(lower.kind, NodeKind::Integer(2));
        assert_eq!(upper.kind, NodeKind::Integer(10));
        assert!(!lower_inclusive);
        assert!(upper_inclusive);
        assert!(reversed);
    }

    #[test]
    fn test_mixed_direction_is_not_a_range() {
        let node = parse("1 < a > 2").unwrap();
        assert_eq!(binary_op(&node), BinaryOp::Gt);
    }

    #[test]
    fn test_term_lists() {
        let node = parse("id not in (1, 2,)").unwrap();
        let NodeKind::Term { values, negated, .. } = node.kind else {
            panic!("expected term")
        };
        assert!(negated);
        assert_eq!(values.len(), 2);

        let node = parse("id in []").unwrap();
        assert!(matches!(node.kind, NodeKind::Term { ref values, .. } if values.is_empty()));
    }

    #[test]
    fn test_like_and_calls() {
        let node = parse(r#"name like "ab%""#).unwrap();
        assert!(matches!(node.kind, NodeKind::Like { ref pattern, .. } if pattern == "ab%"));

        let node = parse("array_length(tags) == 2").unwrap();
        let NodeKind::Binary { left, .. } = node.kind else {
            panic!("expected binary")
        };
        assert!(matches!(
            left.kind,
            NodeKind::Call {
                kind: CallKind::ArrayLength,
                ..
            }
        ));

        assert!(parse("json_contains(a)").is_err());
    }

    #[test]
    fn test_node_text_spans() {
        let source = "x > 1 && (y < 2)";
        let node = parse(source).unwrap();
        let NodeKind::Binary { left, right, .. } = &node.kind else {
            unreachable!()
        };
        assert_eq!(left.text(source), "x > 1");
        assert_eq!(right.text(source), "(y < 2)");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("a >").is_err());
        assert!(parse("(a > 1").is_err());
        assert!(parse("a > 1 b").is_err());
        assert!(parse("a like 1").is_err());
    }
}
