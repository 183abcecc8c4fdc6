//! Filter expressions.
//!
//! A filter string such as `age > 20 and name like "a%"` goes through the
//! [`lexer`], the recursive-descent [`parser`] and finally the
//! [`compiler::ExpressionCompiler`], which produces a [`TypedExpr`] ready to be
//! placed in a plan. [`compile_filter`] runs the whole pipeline and maps
//! failures to [`VecnodeError::ParameterInvalid`].
//!
//! # Examples
//!
//! ```
//! use vecnode::expr::compile_filter;
//! use vecnode::schema::{CollectionSchema, DataType, FieldSchema};
//!
//! let schema = CollectionSchema::builder("books")
//!     .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
//!     .field(FieldSchema::new(101, "year", DataType::Int32))
//!     .build()
//!     .unwrap();
//!
//! let predicate = compile_filter(&schema, "year >= 2000 and id in [1, 2, 3]").unwrap();
//! assert!(predicate.dependent);
//! assert!(compile_filter(&schema, "year >= 'x'").is_err());
//! ```

pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod pattern;
pub mod rules;
pub mod typed;
pub mod value;

use log::warn;
use thiserror::Error;

use crate::error::{Result, VecnodeError};
use crate::schema::{CollectionSchema, SchemaResolver};

pub use compiler::ExpressionCompiler;
pub use typed::{ArithOp, CompareOp, ExprKind, JsonContainsOp, LogicalOp, TypedExpr};
pub use value::{ArrayValue, ScalarValue};

/// A lexing, parsing or typing failure inside the compiler.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct CompileError {
    message: String,
}

impl CompileError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        CompileError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Compile `filter` against `schema` into a boolean predicate.
pub fn compile_filter(schema: &CollectionSchema, filter: &str) -> Result<TypedExpr> {
    ExpressionCompiler::new(SchemaResolver::new(schema), filter)
        .compile()
        .map_err(|e| {
            warn!("rejected filter {filter:?}: {e}");
            VecnodeError::parameter_invalid(format!("Invalid expr: {filter}, {e}"))
        })
}
