//! Typed plan expressions.
//!
//! A [`TypedExpr`] is what the compiler hands to the execution engine. Every
//! node records the data type it evaluates to and whether it depends on row
//! data; folded constants are the only nodes that do not.

use serde::{Deserialize, Serialize};

use crate::expr::value::ScalarValue;
use crate::schema::{ColumnRef, DataType};

/// Comparison operators, including the two string-pattern forms LIKE lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    PrefixMatch,
    Match,
}

impl CompareOp {
    /// The operator that gives the same result with operands swapped.
    pub fn flip(self) -> CompareOp {
        match self {
            CompareOp::LessThan => CompareOp::GreaterThan,
            CompareOp::LessEqual => CompareOp::GreaterEqual,
            CompareOp::GreaterThan => CompareOp::LessThan,
            CompareOp::GreaterEqual => CompareOp::LessEqual,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    ArrayLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonContainsOp {
    Contains,
    ContainsAll,
    ContainsAny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedExpr {
    pub kind: ExprKind,
    pub dtype: DataType,
    /// True when the value varies per row.
    pub dependent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Value(ScalarValue),
    Column(ColumnRef),
    Not(Box<TypedExpr>),
    Logical {
        op: LogicalOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    /// Arithmetic over a column. `right` is absent for `ArrayLength`.
    Arith {
        op: ArithOp,
        left: Box<TypedExpr>,
        right: Option<Box<TypedExpr>>,
    },
    UnaryRange {
        column: ColumnRef,
        op: CompareOp,
        value: ScalarValue,
    },
    BinaryRange {
        column: ColumnRef,
        lower: ScalarValue,
        upper: ScalarValue,
        lower_inclusive: bool,
        upper_inclusive: bool,
    },
    Term {
        column: ColumnRef,
        values: Vec<ScalarValue>,
    },
    Compare {
        op: CompareOp,
        left: ColumnRef,
        right: ColumnRef,
    },
    JsonContains {
        column: ColumnRef,
        op: JsonContainsOp,
        elements: Vec<ScalarValue>,
        same_type: bool,
    },
    /// `column <arith_op> operand <op> value`.
    ArithRangeEval {
        column: ColumnRef,
        arith_op: ArithOp,
        operand: Option<ScalarValue>,
        op: CompareOp,
        value: ScalarValue,
    },
    Exists {
        column: ColumnRef,
    },
}

impl TypedExpr {
    pub fn value(value: ScalarValue) -> Self {
        let dtype = value.data_type();
        TypedExpr {
            kind: ExprKind::Value(value),
            dtype,
            dependent: false,
        }
    }

    pub fn column(column: ColumnRef) -> Self {
        let dtype = column.data_type;
        TypedExpr {
            kind: ExprKind::Column(column),
            dtype,
            dependent: true,
        }
    }

    /// A row-dependent boolean predicate.
    pub fn predicate(kind: ExprKind) -> Self {
        TypedExpr {
            kind,
            dtype: DataType::Bool,
            dependent: true,
        }
    }

    pub fn as_value(&self) -> Option<&ScalarValue> {
        match &self.kind {
            ExprKind::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match &self.kind {
            ExprKind::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, ExprKind::Value(_))
    }

    /// Element type when this is an array column or array literal.
    pub fn array_element_type(&self) -> DataType {
        match &self.kind {
            ExprKind::Column(column) => column.element_type,
            ExprKind::Value(ScalarValue::Array(array)) => array.element_type,
            _ => DataType::None,
        }
    }

    /// Serialize to pretty JSON, for inspection.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
