//! Literal values carried by filter expressions and plans.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

/// A literal array with its inferred element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Vec<ScalarValue>,
    /// Common element type, `None` for empty or mixed arrays.
    pub element_type: DataType,
    /// True when every element has the same type.
    pub same_type: bool,
}

impl ArrayValue {
    pub fn new(values: Vec<ScalarValue>) -> Self {
        let mut element_type = DataType::None;
        let mut same_type = true;
        for value in &values {
            let dtype = value.data_type();
            if element_type == DataType::None {
                element_type = dtype;
            } else if element_type != dtype {
                same_type = false;
            }
        }
        ArrayValue {
            values,
            element_type: if same_type { element_type } else { DataType::None },
            same_type,
        }
    }
}

/// A compile-time scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Array(ArrayValue),
}

impl ScalarValue {
    /// The type a literal of this kind is inferred as.
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Bool(_) => DataType::Bool,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Double,
            ScalarValue::String(_) => DataType::VarChar,
            ScalarValue::Array(_) => DataType::Array,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int64(i) => Some(*i as f64),
            ScalarValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarValue::Int64(_) | ScalarValue::Float64(_))
    }

    /// Ordering between two literals of compatible kinds. Integers and
    /// floats compare numerically.
    pub fn compare(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Int64(a), ScalarValue::Int64(b)) => Some(a.cmp(b)),
            (ScalarValue::String(a), ScalarValue::String(b)) => Some(a.cmp(b)),
            (ScalarValue::Bool(a), ScalarValue::Bool(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            _ => None,
        }
    }

    /// Equality with numeric widening.
    pub fn loose_eq(&self, other: &ScalarValue) -> Option<bool> {
        match (self, other) {
            (ScalarValue::Array(a), ScalarValue::Array(b)) => Some(a.values == b.values),
            _ => self.compare(other).map(|o| o == Ordering::Equal),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Int64(i) => write!(f, "{i}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::String(s) => write!(f, "{s:?}"),
            ScalarValue::Array(array) => {
                write!(f, "[")?;
                for (i, value) in array.values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_element_type() {
        let array = ArrayValue::new(vec![ScalarValue::Int64(1), ScalarValue::Int64(2)]);
        assert!(array.same_type);
        assert_eq!(array.element_type, DataType::Int64);

        let mixed = ArrayValue::new(vec![ScalarValue::Int64(1), ScalarValue::Float64(2.0)]);
        assert!(!mixed.same_type);
        assert_eq!(mixed.element_type, DataType::None);

        let empty = ArrayValue::new(Vec::new());
        assert!(empty.same_type);
        assert_eq!(empty.element_type, DataType::None);
    }

    #[test]
    fn test_numeric_compare_widens() {
        let one = ScalarValue::Int64(1);
        let half = ScalarValue::Float64(0.5);
        assert_eq!(one.compare(&half), Some(Ordering::Greater));
        assert_eq!(ScalarValue::Float64(1.0).loose_eq(&one), Some(true));
        assert_eq!(ScalarValue::String("a".into()).compare(&one), None);
    }

    #[test]
    fn test_display() {
        let array = ScalarValue::Array(ArrayValue::new(vec![
            ScalarValue::Int64(1),
            ScalarValue::String("x".into()),
        ]));
        assert_eq!(array.to_string(), "[1, \"x\"]");
    }
}
