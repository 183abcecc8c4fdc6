//! Column data types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data type of a schema field, a plan expression or a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataType {
    #[default]
    None,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
    VarChar,
    Array,
    Json,
    BinaryVector,
    FloatVector,
    Float16Vector,
    BFloat16Vector,
    SparseFloatVector,
}

impl DataType {
    pub fn is_bool(self) -> bool {
        self == DataType::Bool
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_arithmetic(self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_string(self) -> bool {
        matches!(self, DataType::String | DataType::VarChar)
    }

    pub fn is_json(self) -> bool {
        self == DataType::Json
    }

    pub fn is_array(self) -> bool {
        self == DataType::Array
    }

    /// True for every dense or sparse vector type.
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            DataType::BinaryVector
                | DataType::FloatVector
                | DataType::Float16Vector
                | DataType::BFloat16Vector
                | DataType::SparseFloatVector
        )
    }

    /// Scalar types that support ordering comparisons.
    pub fn is_primitive(self) -> bool {
        self.is_bool() || self.is_arithmetic() || self.is_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_families() {
        assert!(DataType::Int8.is_integer());
        assert!(!DataType::Float.is_integer());
        assert!(DataType::Double.is_arithmetic());
        assert!(DataType::VarChar.is_string());
        assert!(DataType::SparseFloatVector.is_vector());
        assert!(!DataType::Json.is_primitive());
        assert!(!DataType::Array.is_vector());
    }
}
