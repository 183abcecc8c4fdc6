//! Untyped syntax tree produced by the filter parser.

use crate::expr::lexer::CallKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

/// A syntax node and the byte span of source it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub start: usize,
    pub end: usize,
}

impl Node {
    pub fn new(kind: NodeKind, start: usize, end: usize) -> Self {
        Node { kind, start, end }
    }

    /// Source text this node covers.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Identifier(String),
    JsonIdentifier(String),
    /// `[a, b, ...]` literal.
    Array(Vec<Node>),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `lower < column < upper`, or the reversed `upper > column > lower`.
    Range {
        lower: Box<Node>,
        column: Box<Node>,
        upper: Box<Node>,
        lower_inclusive: bool,
        upper_inclusive: bool,
        reversed: bool,
    },
    /// `column in [...]`. An empty list is the empty term.
    Term {
        column: Box<Node>,
        values: Vec<Node>,
        negated: bool,
    },
    Like {
        operand: Box<Node>,
        pattern: String,
    },
    Exists(Box<Node>),
    Call {
        kind: CallKind,
        args: Vec<Node>,
    },
}
