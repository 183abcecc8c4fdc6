//! Syntax tree to typed plan expression.
//!
//! [`ExpressionCompiler`] walks the tree produced by the parser, resolves
//! identifiers against the schema, folds constant sub-expressions and checks
//! operand types. Every rule violation is reported as a [`CompileError`]
//! naming the source text of the offending node.

use std::cmp::Ordering;

use log::debug;

use crate::expr::CompileError;
use crate::expr::ast::{BinaryOp, Node, NodeKind, UnaryOp};
use crate::expr::lexer::CallKind;
use crate::expr::parser;
use crate::expr::pattern::translate_pattern_match;
use crate::expr::rules::{can_arithmetic, can_be_compared, cal_data_type, cast_array, cast_value};
use crate::expr::typed::{ArithOp, CompareOp, ExprKind, JsonContainsOp, LogicalOp, TypedExpr};
use crate::expr::value::{ArrayValue, ScalarValue};
use crate::schema::{ColumnRef, DataType, SchemaResolver};

type CompileResult<T> = std::result::Result<T, CompileError>;

/// Compiles one filter string against one schema snapshot.
pub struct ExpressionCompiler<'a> {
    resolver: SchemaResolver<'a>,
    source: &'a str,
}

impl<'a> ExpressionCompiler<'a> {
    pub fn new(resolver: SchemaResolver<'a>, source: &'a str) -> Self {
        ExpressionCompiler { resolver, source }
    }

    /// Parse and compile the whole filter into a boolean predicate.
    pub fn compile(&self) -> CompileResult<TypedExpr> {
        let node = parser::parse(self.source)?;
        let expr = self.visit(&node)?;
        let expr = self.as_predicate(expr, &node)?;
        if expr.dtype != DataType::Bool {
            return Err(self.error(&node, "predicate is not a boolean expression"));
        }
        debug!("compiled filter {:?} to {:?}", self.source, expr.kind);
        Ok(expr)
    }

    fn error(&self, node: &Node, detail: impl std::fmt::Display) -> CompileError {
        CompileError::new(format!("{detail}, expression: {}", node.text(self.source)))
    }

    fn visit(&self, node: &Node) -> CompileResult<TypedExpr> {
        match &node.kind {
            NodeKind::Integer(v) => Ok(TypedExpr::value(ScalarValue::Int64(*v))),
            NodeKind::Float(v) => Ok(TypedExpr::value(ScalarValue::Float64(*v))),
            NodeKind::Bool(v) => Ok(TypedExpr::value(ScalarValue::Bool(*v))),
            NodeKind::Str(v) => Ok(TypedExpr::value(ScalarValue::String(v.clone()))),
            NodeKind::Identifier(_) | NodeKind::JsonIdentifier(_) => {
                Ok(TypedExpr::column(self.column_of(node)?))
            }
            NodeKind::Array(items) => self.visit_array(node, items),
            NodeKind::Unary { op, operand } => self.visit_unary(node, *op, operand),
            NodeKind::Binary { op, left, right } => self.visit_binary(node, *op, left, right),
            NodeKind::Range {
                lower,
                column,
                upper,
                lower_inclusive,
                upper_inclusive,
                ..
            } => self.visit_range(node, lower, column, upper, *lower_inclusive, *upper_inclusive),
            NodeKind::Term {
                column,
                values,
                negated,
            } => self.visit_term(node, column, values, *negated),
            NodeKind::Like { operand, pattern } => self.visit_like(node, operand, pattern),
            NodeKind::Exists(operand) => self.visit_exists(node, operand),
            NodeKind::Call { kind, args } => match kind {
                CallKind::ArrayLength => self.visit_array_length(node, &args[0]),
                CallKind::Contains => {
                    self.visit_contains(node, JsonContainsOp::Contains, &args[0], &args[1])
                }
                CallKind::ContainsAll => {
                    self.visit_contains(node, JsonContainsOp::ContainsAll, &args[0], &args[1])
                }
                CallKind::ContainsAny => {
                    self.visit_contains(node, JsonContainsOp::ContainsAny, &args[0], &args[1])
                }
            },
        }
    }

    /// Resolve an identifier node. A JSON field cannot be used without a key.
    fn column_of(&self, node: &Node) -> CompileResult<ColumnRef> {
        let column = match &node.kind {
            NodeKind::Identifier(name) => self.resolver.resolve(name),
            NodeKind::JsonIdentifier(text) => self.resolver.resolve_identifier(text),
            _ => return Err(self.error(node, "expected a field name")),
        }
        .map_err(|e| self.error(node, e))?;

        if column.data_type.is_json() && !column.is_nested() {
            return Err(self.error(node, "can not use a JSON field without a key"));
        }
        Ok(column)
    }

    /// A bare Bool column used where a predicate is expected means `col == true`.
    fn as_predicate(&self, expr: TypedExpr, node: &Node) -> CompileResult<TypedExpr> {
        match expr.kind {
            ExprKind::Column(column) if column.value_type().is_bool() => {
                if column.is_bare_array() {
                    return Err(self.error(node, "an array field can not be used as a predicate"));
                }
                Ok(TypedExpr::predicate(ExprKind::UnaryRange {
                    column,
                    op: CompareOp::Equal,
                    value: ScalarValue::Bool(true),
                }))
            }
            kind => Ok(TypedExpr { kind, ..expr }),
        }
    }

    fn visit_array(&self, node: &Node, items: &[Node]) -> CompileResult<TypedExpr> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match self.visit(item)?.kind {
                ExprKind::Value(value) => values.push(value),
                _ => return Err(self.error(node, "array elements must be constants")),
            }
        }
        Ok(TypedExpr::value(ScalarValue::Array(ArrayValue::new(values))))
    }

    fn visit_unary(&self, node: &Node, op: UnaryOp, operand: &Node) -> CompileResult<TypedExpr> {
        let child = self.visit(operand)?;

        if let Some(value) = child.as_value() {
            let folded = match (op, value) {
                (UnaryOp::Plus, v) if v.is_numeric() => Some(v.clone()),
                (UnaryOp::Minus, ScalarValue::Int64(i)) => i.checked_neg().map(ScalarValue::Int64),
                (UnaryOp::Minus, ScalarValue::Float64(f)) => Some(ScalarValue::Float64(-f)),
                (UnaryOp::Not, ScalarValue::Bool(b)) => Some(ScalarValue::Bool(!b)),
                _ => None,
            };
            return folded
                .map(TypedExpr::value)
                .ok_or_else(|| self.error(node, "invalid operand for unary operator"));
        }

        if child.as_column().is_some_and(ColumnRef::is_bare_array) {
            return Err(self.error(node, "an array field can not be used directly"));
        }

        match op {
            UnaryOp::Plus if child.dtype.is_arithmetic() || child.dtype.is_json() => Ok(child),
            UnaryOp::Not => {
                let child = self.as_predicate(child, operand)?;
                if child.dtype != DataType::Bool {
                    return Err(self.error(node, "not requires a boolean operand"));
                }
                Ok(TypedExpr::predicate(ExprKind::Not(Box::new(child))))
            }
            UnaryOp::BitNot => Err(self.error(node, "operator ~ is not supported")),
            _ => Err(self.error(node, "unary operator is only supported on constants")),
        }
    }

    fn visit_binary(
        &self,
        node: &Node,
        op: BinaryOp,
        left: &Node,
        right: &Node,
    ) -> CompileResult<TypedExpr> {
        if matches!(
            op,
            BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::BitAnd | BinaryOp::Shl | BinaryOp::Shr
        ) {
            return Err(self.error(node, format!("operator {} is not supported", op.symbol())));
        }

        let lhs = self.visit(left)?;
        let rhs = self.visit(right)?;

        match op {
            BinaryOp::And | BinaryOp::Or => self.logical(node, op, lhs, left, rhs, right),
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow => self.arithmetic(node, op, lhs, rhs),
            _ => self.comparison(node, op, lhs, rhs),
        }
    }

    fn logical(
        &self,
        node: &Node,
        op: BinaryOp,
        lhs: TypedExpr,
        left: &Node,
        rhs: TypedExpr,
        right: &Node,
    ) -> CompileResult<TypedExpr> {
        if let (Some(ScalarValue::Bool(a)), Some(ScalarValue::Bool(b))) =
            (lhs.as_value(), rhs.as_value())
        {
            let folded = if op == BinaryOp::And { *a && *b } else { *a || *b };
            return Ok(TypedExpr::value(ScalarValue::Bool(folded)));
        }

        let lhs = self.as_predicate(lhs, left)?;
        let rhs = self.as_predicate(rhs, right)?;
        if lhs.dtype != DataType::Bool || rhs.dtype != DataType::Bool {
            return Err(self.error(node, "logical operands must be boolean"));
        }
        let op = if op == BinaryOp::And {
            LogicalOp::And
        } else {
            LogicalOp::Or
        };
        Ok(TypedExpr::predicate(ExprKind::Logical {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
        }))
    }

    fn arithmetic(
        &self,
        node: &Node,
        op: BinaryOp,
        lhs: TypedExpr,
        rhs: TypedExpr,
    ) -> CompileResult<TypedExpr> {
        if let (Some(a), Some(b)) = (lhs.as_value(), rhs.as_value()) {
            return fold_arithmetic(op, a, b)
                .map(TypedExpr::value)
                .map_err(|detail| self.error(node, detail));
        }

        let arith_op = match op {
            BinaryOp::Add => ArithOp::Add,
            BinaryOp::Sub => ArithOp::Sub,
            BinaryOp::Mul => ArithOp::Mul,
            BinaryOp::Div => ArithOp::Div,
            BinaryOp::Mod => ArithOp::Mod,
            _ => return Err(self.error(node, "power is only supported on constants")),
        };

        for side in [&lhs, &rhs] {
            match &side.kind {
                ExprKind::Value(_) => {}
                ExprKind::Column(column) if !column.is_bare_array() => {}
                ExprKind::Column(_) => {
                    return Err(self.error(node, "an array field can not be used in arithmetic"));
                }
                _ => return Err(self.error(node, "nested arithmetic is not supported")),
            }
        }

        let element = |e: &TypedExpr| {
            if e.dtype.is_array() {
                e.array_element_type()
            } else {
                e.dtype
            }
        };
        if !can_arithmetic(element(&lhs), element(&rhs)) {
            return Err(self.error(
                node,
                format!(
                    "arithmetic between {} and {} is not supported",
                    lhs.dtype, rhs.dtype
                ),
            ));
        }
        let dtype = cal_data_type(&lhs, &rhs).map_err(|e| self.error(node, e))?;

        Ok(TypedExpr {
            kind: ExprKind::Arith {
                op: arith_op,
                left: Box::new(lhs),
                right: Some(Box::new(rhs)),
            },
            dtype,
            dependent: true,
        })
    }

    fn comparison(
        &self,
        node: &Node,
        op: BinaryOp,
        lhs: TypedExpr,
        rhs: TypedExpr,
    ) -> CompileResult<TypedExpr> {
        let op = compare_op(op);

        if let (Some(a), Some(b)) = (lhs.as_value(), rhs.as_value()) {
            return fold_comparison(op, a, b)
                .map(|v| TypedExpr::value(ScalarValue::Bool(v)))
                .ok_or_else(|| self.error(node, "operands can not be compared"));
        }

        if !can_be_compared(&lhs, &rhs) {
            return Err(self.error(
                node,
                format!("{} and {} can not be compared", lhs.dtype, rhs.dtype),
            ));
        }

        match (lhs.kind, rhs.kind) {
            (ExprKind::Value(value), target) => {
                let target = TypedExpr { kind: target, ..rhs };
                self.compare_with_value(node, op.flip(), target, value)
            }
            (target, ExprKind::Value(value)) => {
                let target = TypedExpr { kind: target, ..lhs };
                self.compare_with_value(node, op, target, value)
            }
            (ExprKind::Column(left), ExprKind::Column(right)) => {
                if left.is_bare_array() || right.is_bare_array() {
                    return Err(self.error(node, "an array field can not be compared directly"));
                }
                Ok(TypedExpr::predicate(ExprKind::Compare { op, left, right }))
            }
            _ => Err(self.error(node, "comparison between these expressions is not supported")),
        }
    }

    fn compare_with_value(
        &self,
        node: &Node,
        op: CompareOp,
        target: TypedExpr,
        value: ScalarValue,
    ) -> CompileResult<TypedExpr> {
        match target.kind {
            ExprKind::Column(column) => {
                if column.is_bare_array() {
                    return Err(self.error(node, "an array field can not be compared directly"));
                }
                let value = cast_value(column.value_type(), &value)
                    .map_err(|e| self.error(node, e))?;
                Ok(TypedExpr::predicate(ExprKind::UnaryRange { column, op, value }))
            }
            ExprKind::Arith {
                op: arith_op,
                left,
                right,
            } => {
                if !matches!(op, CompareOp::Equal | CompareOp::NotEqual) {
                    return Err(self.error(
                        node,
                        "only == and != are supported on arithmetic expressions",
                    ));
                }
                let value = cast_value(target.dtype, &value).map_err(|e| self.error(node, e))?;
                let (column, operand) = self.arith_operands(node, arith_op, *left, right)?;
                Ok(TypedExpr::predicate(ExprKind::ArithRangeEval {
                    column,
                    arith_op,
                    operand,
                    op,
                    value,
                }))
            }
            _ => Err(self.error(node, "comparison target must be a field")),
        }
    }

    /// Split an arithmetic node into its column and constant operand.
    fn arith_operands(
        &self,
        node: &Node,
        arith_op: ArithOp,
        left: TypedExpr,
        right: Option<Box<TypedExpr>>,
    ) -> CompileResult<(ColumnRef, Option<ScalarValue>)> {
        let right = right.map(|r| r.kind);
        match (left.kind, right) {
            (ExprKind::Column(column), None) if arith_op == ArithOp::ArrayLength => {
                Ok((column, None))
            }
            (ExprKind::Column(column), Some(ExprKind::Value(operand))) => {
                let operand = cast_value(column.value_type(), &operand)
                    .map_err(|e| self.error(node, e))?;
                Ok((column, Some(operand)))
            }
            (ExprKind::Value(operand), Some(ExprKind::Column(column)))
                if matches!(arith_op, ArithOp::Add | ArithOp::Mul) =>
            {
                let operand = cast_value(column.value_type(), &operand)
                    .map_err(|e| self.error(node, e))?;
                Ok((column, Some(operand)))
            }
            _ => Err(self.error(
                node,
                "arithmetic comparison needs one field and one constant",
            )),
        }
    }

    fn visit_range(
        &self,
        node: &Node,
        lower: &Node,
        column: &Node,
        upper: &Node,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> CompileResult<TypedExpr> {
        let column = self.column_of(column)?;
        if column.is_bare_array() {
            return Err(self.error(node, "an array field can not be used in a range"));
        }
        let dtype = column.value_type();
        if !(dtype.is_primitive() || dtype.is_json()) {
            return Err(self.error(node, format!("range is not supported on {dtype}")));
        }

        let bound = |n: &Node| -> CompileResult<ScalarValue> {
            let expr = self.visit(n)?;
            let value = expr
                .as_value()
                .ok_or_else(|| self.error(n, "range bounds must be constants"))?;
            cast_value(dtype, value).map_err(|e| self.error(n, e))
        };
        let lower = bound(lower)?;
        let upper = bound(upper)?;

        Ok(TypedExpr::predicate(ExprKind::BinaryRange {
            column,
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
        }))
    }

    fn visit_term(
        &self,
        node: &Node,
        column: &Node,
        values: &[Node],
        negated: bool,
    ) -> CompileResult<TypedExpr> {
        let column = self.column_of(column)?;
        if column.is_bare_array() {
            return Err(self.error(node, "an array field can not be used with in"));
        }
        let dtype = column.value_type();

        let mut casted = Vec::with_capacity(values.len());
        for value_node in values {
            let expr = self.visit(value_node)?;
            let value = expr
                .as_value()
                .ok_or_else(|| self.error(value_node, "term values must be constants"))?;
            casted.push(cast_value(dtype, value).map_err(|e| self.error(value_node, e))?);
        }

        let term = TypedExpr::predicate(ExprKind::Term {
            column,
            values: casted,
        });
        if negated {
            Ok(TypedExpr::predicate(ExprKind::Not(Box::new(term))))
        } else {
            Ok(term)
        }
    }

    fn visit_like(&self, node: &Node, operand: &Node, pattern: &str) -> CompileResult<TypedExpr> {
        let column = self.column_of(operand)?;
        let supported = column.value_type().is_string()
            || (column.data_type.is_json() && column.is_nested())
            || (column.data_type.is_array() && column.element_type == DataType::VarChar);
        if !supported {
            return Err(self.error(
                node,
                format!("like is not supported on {}", column.data_type),
            ));
        }

        let (op, value) = translate_pattern_match(pattern);
        Ok(TypedExpr::predicate(ExprKind::UnaryRange {
            column,
            op,
            value: ScalarValue::String(value),
        }))
    }

    fn visit_exists(&self, node: &Node, operand: &Node) -> CompileResult<TypedExpr> {
        let column = self.column_of(operand)?;
        if !(column.data_type.is_array() || (column.data_type.is_json() && column.is_nested())) {
            return Err(self.error(node, "exists requires a JSON key or an array field"));
        }
        Ok(TypedExpr::predicate(ExprKind::Exists { column }))
    }

    fn visit_array_length(&self, node: &Node, operand: &Node) -> CompileResult<TypedExpr> {
        let column = self.column_of(operand)?;
        if !(column.data_type.is_array() || column.data_type.is_json()) {
            return Err(self.error(node, "array_length requires an array or JSON field"));
        }
        Ok(TypedExpr {
            kind: ExprKind::Arith {
                op: ArithOp::ArrayLength,
                left: Box::new(TypedExpr::column(column)),
                right: None,
            },
            dtype: DataType::Int64,
            dependent: true,
        })
    }

    fn visit_contains(
        &self,
        node: &Node,
        op: JsonContainsOp,
        field: &Node,
        elements: &Node,
    ) -> CompileResult<TypedExpr> {
        let column = self.column_of(field)?;
        if !(column.data_type.is_json() || column.data_type.is_array()) {
            return Err(self.error(node, "contains requires a JSON or array field"));
        }

        let value_expr = self.visit(elements)?;
        let Some(value) = value_expr.as_value() else {
            return Err(self.error(elements, "contains expects a constant"));
        };

        if column.data_type.is_array() {
            let field_expr = TypedExpr::column(column.clone());
            if !can_be_compared(&field_expr, &value_expr) {
                return Err(self.error(
                    node,
                    format!(
                        "elements of type {} can not be compared with {}",
                        column.element_type,
                        value.data_type()
                    ),
                ));
            }
        }

        let (elements, same_type) = match op {
            JsonContainsOp::Contains => (vec![value.clone()], true),
            JsonContainsOp::ContainsAll | JsonContainsOp::ContainsAny => {
                let ScalarValue::Array(array) = value else {
                    return Err(self.error(node, "contains_all and contains_any expect an array"));
                };
                let values = if column.data_type.is_array() {
                    cast_array(column.element_type, array).map_err(|e| self.error(node, e))?
                } else {
                    array.values.clone()
                };
                (values, array.same_type)
            }
        };

        Ok(TypedExpr::predicate(ExprKind::JsonContains {
            column,
            op,
            elements,
            same_type,
        }))
    }
}

fn compare_op(op: BinaryOp) -> CompareOp {
    match op {
        BinaryOp::Eq => CompareOp::Equal,
        BinaryOp::Ne => CompareOp::NotEqual,
        BinaryOp::Lt => CompareOp::LessThan,
        BinaryOp::Le => CompareOp::LessEqual,
        BinaryOp::Gt => CompareOp::GreaterThan,
        _ => CompareOp::GreaterEqual,
    }
}

fn fold_arithmetic(op: BinaryOp, a: &ScalarValue, b: &ScalarValue) -> Result<ScalarValue, String> {
    if op == BinaryOp::Pow {
        return match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Ok(ScalarValue::Float64(x.powf(y))),
            _ => Err("power requires numeric operands".to_string()),
        };
    }

    match (a, b) {
        (ScalarValue::Int64(x), ScalarValue::Int64(y)) => {
            let result = match op {
                BinaryOp::Add => x.checked_add(*y),
                BinaryOp::Sub => x.checked_sub(*y),
                BinaryOp::Mul => x.checked_mul(*y),
                BinaryOp::Div if *y == 0 => return Err("division by zero".to_string()),
                BinaryOp::Div => x.checked_div(*y),
                BinaryOp::Mod if *y == 0 => return Err("modulo by zero".to_string()),
                BinaryOp::Mod => x.checked_rem(*y),
                _ => None,
            };
            result
                .map(ScalarValue::Int64)
                .ok_or_else(|| "integer overflow".to_string())
        }
        (a, b) if a.is_numeric() && b.is_numeric() => {
            let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
                return Err("operands must be numeric".to_string());
            };
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                _ => return Err("modulo requires integer operands".to_string()),
            };
            Ok(ScalarValue::Float64(result))
        }
        _ => Err("arithmetic requires numeric operands".to_string()),
    }
}

fn fold_comparison(op: CompareOp, a: &ScalarValue, b: &ScalarValue) -> Option<bool> {
    match op {
        CompareOp::Equal => a.loose_eq(b),
        CompareOp::NotEqual => a.loose_eq(b).map(|eq| !eq),
        _ if matches!(a, ScalarValue::Bool(_)) => None,
        _ => {
            let ordering = a.compare(b)?;
            Some(match op {
                CompareOp::LessThan => ordering == Ordering::Less,
                CompareOp::LessEqual => ordering != Ordering::Greater,
                CompareOp::GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CollectionSchema, FieldSchema};

    fn schema() -> CollectionSchema {
        CollectionSchema::builder("c")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "age", DataType::Int32))
            .field(FieldSchema::new(102, "score", DataType::Double))
            .field(FieldSchema::new(103, "name", DataType::VarChar))
            .field(FieldSchema::new(104, "flag", DataType::Bool))
            .field(FieldSchema::new(105, "info", DataType::Json))
            .field(
                FieldSchema::new(106, "tags", DataType::Array).with_element_type(DataType::VarChar),
            )
            .field(
                FieldSchema::new(107, "nums", DataType::Array).with_element_type(DataType::Int64),
            )
            .field(FieldSchema::new(108, "vec", DataType::FloatVector).with_dim(4))
            .enable_dynamic_field()
            .build()
            .unwrap()
    }

    fn compile(filter: &str) -> CompileResult<TypedExpr> {
        let schema = schema();
        ExpressionCompiler::new(SchemaResolver::new(&schema), filter).compile()
    }

    fn kind(filter: &str) -> ExprKind {
        compile(filter).unwrap().kind
    }

    #[test]
    fn test_unary_range_casts_value() {
        let ExprKind::UnaryRange { column, op, value } = kind("score > 1") else {
            panic!("expected unary range")
        };
        assert_eq!(column.field_id, 102);
        assert_eq!(op, CompareOp::GreaterThan);
        assert_eq!(value, ScalarValue::Float64(1.0));
        assert!(compile("age > 1.5").is_err());
        assert!(compile("name == 1").is_err());
    }

    #[test]
    fn test_literal_on_left_flips_ordering_only() {
        let ExprKind::UnaryRange { op, .. } = kind("3 < age") else {
            panic!("expected unary range")
        };
        assert_eq!(op, CompareOp::GreaterThan);

        let ExprKind::UnaryRange { op, .. } = kind("3 == age") else {
            panic!("expected unary range")
        };
        assert_eq!(op, CompareOp::Equal);
    }

    #[test]
    fn test_constant_folding() {
        let expr = compile("1 + 2 * 3 == 7").unwrap();
        assert_eq!(expr.kind, ExprKind::Value(ScalarValue::Bool(true)));
        assert!(!expr.dependent);

        let ExprKind::UnaryRange { value, .. } = kind("age == -(3 - 5) * 4") else {
            panic!("expected unary range")
        };
        assert_eq!(value, ScalarValue::Int64(8));
        assert_eq!(kind("'abc' < 'abd'"), ExprKind::Value(ScalarValue::Bool(true)));
        assert_eq!(kind("1 == 1.0"), ExprKind::Value(ScalarValue::Bool(true)));
    }

    #[test]
    fn test_power_result_cast() {
        // 2 ** 3 is a Double, which an Int32 column can not take.
        assert!(compile("age == 2 ** 3").is_err());
        let ExprKind::UnaryRange { value, .. } = kind("score == 2 ** 3") else {
            panic!("expected unary range")
        };
        assert_eq!(value, ScalarValue::Float64(8.0));
    }

    #[test]
    fn test_fold_errors() {
        assert!(compile("age == 1 / 0").is_err());
        assert!(compile("age == 1.5 % 2").is_err());
        assert!(compile("age > 1 and 2").is_err());
    }

    #[test]
    fn test_logical_and_not() {
        let ExprKind::Logical { op, left, right } = kind("age > 1 && not (name == 'a')") else {
            panic!("expected logical")
        };
        assert_eq!(op, LogicalOp::And);
        assert!(matches!(left.kind, ExprKind::UnaryRange { .. }));
        assert!(matches!(right.kind, ExprKind::Not(_)));

        assert_eq!(kind("not false"), ExprKind::Value(ScalarValue::Bool(true)));
        assert!(compile("not age").is_err());
    }

    #[test]
    fn test_bool_column_predicate() {
        let ExprKind::UnaryRange { column, op, value } = kind("flag") else {
            panic!("expected unary range")
        };
        assert_eq!(column.field_id, 104);
        assert_eq!(op, CompareOp::Equal);
        assert_eq!(value, ScalarValue::Bool(true));

        assert!(matches!(kind("not flag"), ExprKind::Not(_)));
        assert!(matches!(kind("flag or age > 1"), ExprKind::Logical { .. }));
    }

    #[test]
    fn test_non_boolean_predicate_rejected() {
        let err = compile("age").unwrap_err();
        assert!(err.message().contains("predicate is not a boolean expression"));
        assert!(compile("1 + 1").is_err());
    }

    #[test]
    fn test_range() {
        let ExprKind::BinaryRange {
            lower,
            upper,
            lower_inclusive,
            upper_inclusive,
            ..
        } = kind("1 <= score < 5")
        else {
            panic!("expected range")
        };
        assert_eq!(lower, ScalarValue::Float64(1.0));
        assert_eq!(upper, ScalarValue::Float64(5.0));
        assert!(lower_inclusive);
        assert!(!upper_inclusive);

        let ExprKind::BinaryRange { lower, upper, .. } = kind("9 > age >= 3") else {
            panic!("expected range")
        };
        assert_eq!(lower, ScalarValue::Int64(3));
        assert_eq!(upper, ScalarValue::Int64(9));

        assert!(compile("1 < tags < 3").is_err());
        assert!(compile("age < score < 3").is_err());
    }

    #[test]
    fn test_term() {
        let ExprKind::Not(inner) = kind("age not in [1, 2]") else {
            panic!("expected not")
        };
        let ExprKind::Term { values, .. } = inner.kind else {
            panic!("expected term")
        };
        assert_eq!(values, vec![ScalarValue::Int64(1), ScalarValue::Int64(2)]);

        let ExprKind::Term { values, .. } = kind("score in (1, 2.5)") else {
            panic!("expected term")
        };
        assert_eq!(
            values,
            vec![ScalarValue::Float64(1.0), ScalarValue::Float64(2.5)]
        );

        assert!(matches!(kind("id in []"), ExprKind::Term { ref values, .. } if values.is_empty()));
        assert!(compile("age in [1, 'x']").is_err());
    }

    #[test]
    fn test_like() {
        let ExprKind::UnaryRange { op, value, .. } = kind("name like 'ab%'") else {
            panic!("expected unary range")
        };
        assert_eq!(op, CompareOp::PrefixMatch);
        assert_eq!(value, ScalarValue::String("ab".into()));

        assert!(compile(r#"info["k"] like "%x%""#).is_ok());
        assert!(compile("tags like 'a%'").is_ok());
        assert!(compile("age like 'a%'").is_err());
        assert!(compile("info like 'a%'").is_err());
    }

    #[test]
    fn test_json_and_dynamic_fields() {
        let ExprKind::UnaryRange { column, .. } = kind(r#"info["a"][0] == 1"#) else {
            panic!("expected unary range")
        };
        assert_eq!(column.nested_path, vec!["a", "0"]);

        let ExprKind::UnaryRange { column, value, .. } = kind("color == 'red'") else {
            panic!("expected unary range")
        };
        assert_eq!(column.data_type, DataType::Json);
        assert_eq!(column.nested_path, vec!["color"]);
        assert_eq!(value, ScalarValue::String("red".into()));
    }

    #[test]
    fn test_array_rules() {
        assert!(compile("tags == 'a'").is_err());
        let ExprKind::UnaryRange { column, value, .. } = kind("tags[0] == 'a'") else {
            panic!("expected unary range")
        };
        assert_eq!(column.value_type(), DataType::VarChar);
        assert_eq!(value, ScalarValue::String("a".into()));
    }

    #[test]
    fn test_compare_columns() {
        let ExprKind::Compare { op, left, right } = kind("age < score") else {
            panic!("expected compare")
        };
        assert_eq!(op, CompareOp::LessThan);
        assert_eq!((left.field_id, right.field_id), (101, 102));
        assert!(compile("age < name").is_err());
        assert!(compile("nums == tags").is_err());
    }

    #[test]
    fn test_arith_range_eval() {
        let ExprKind::ArithRangeEval {
            arith_op,
            operand,
            op,
            value,
            ..
        } = kind("age + 2 == 10")
        else {
            panic!("expected arith eval")
        };
        assert_eq!(arith_op, ArithOp::Add);
        assert_eq!(operand, Some(ScalarValue::Int64(2)));
        assert_eq!(op, CompareOp::Equal);
        assert_eq!(value, ScalarValue::Int64(10));

        assert!(matches!(
            kind("3 * score != 1"),
            ExprKind::ArithRangeEval {
                arith_op: ArithOp::Mul,
                ..
            }
        ));
        assert!(compile("3 - age == 1").is_err());
        assert!(compile("age + 2 > 10").is_err());

        let ExprKind::ArithRangeEval {
            arith_op, operand, ..
        } = kind("array_length(tags) == 2")
        else {
            panic!("expected arith eval")
        };
        assert_eq!(arith_op, ArithOp::ArrayLength);
        assert_eq!(operand, None);
    }

    #[test]
    fn test_contains() {
        let ExprKind::JsonContains {
            op,
            elements,
            same_type,
            ..
        } = kind("array_contains_any(nums, [1, 2])")
        else {
            panic!("expected contains")
        };
        assert_eq!(op, JsonContainsOp::ContainsAny);
        assert_eq!(elements.len(), 2);
        assert!(same_type);

        let ExprKind::JsonContains {
            elements,
            same_type,
            ..
        } = kind(r#"json_contains_all(info["a"], [1, "x"])"#)
        else {
            panic!("expected contains")
        };
        assert_eq!(elements.len(), 2);
        assert!(!same_type);

        assert!(compile("array_contains(tags, 1)").is_err());
        assert!(compile("json_contains(age, 1)").is_err());
        assert!(compile("array_contains_all(nums, 1)").is_err());
    }

    #[test]
    fn test_exists() {
        assert!(matches!(kind(r#"exists info["a"]"#), ExprKind::Exists { .. }));
        assert!(matches!(kind("EXISTS tags"), ExprKind::Exists { .. }));
        assert!(compile("exists age").is_err());
    }

    #[test]
    fn test_unsupported_operators() {
        assert!(compile("age & 1 == 1").is_err());
        assert!(compile("age << 1 == 2").is_err());
        assert!(compile("~age == 1").is_err());
    }

    #[test]
    fn test_error_names_subexpression() {
        let err = compile("age > 1 and name == 3").unwrap_err();
        assert!(err.message().contains("name == 3"), "{}", err.message());
    }
}
