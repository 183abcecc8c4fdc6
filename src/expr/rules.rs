//! Type compatibility and promotion rules.

use crate::expr::CompileError;
use crate::expr::typed::TypedExpr;
use crate::expr::value::{ArrayValue, ScalarValue};
use crate::schema::DataType;

/// Whether two scalar types may be compared. JSON compares with anything.
pub fn can_be_compared_type(a: DataType, b: DataType) -> bool {
    match a {
        DataType::Bool => b.is_bool() || b.is_json(),
        t if t.is_arithmetic() => b.is_arithmetic() || b.is_json(),
        t if t.is_string() => b.is_string() || b.is_json(),
        DataType::Json => true,
        _ => false,
    }
}

/// Comparability of two expressions, looking through arrays to their
/// element types.
pub fn can_be_compared(a: &TypedExpr, b: &TypedExpr) -> bool {
    let resolve = |e: &TypedExpr| {
        if e.dtype.is_array() {
            e.array_element_type()
        } else {
            e.dtype
        }
    };
    can_be_compared_type(resolve(a), resolve(b))
}

/// Whether two types may be combined arithmetically. JSON pairs with any
/// numeric type but not with another JSON value.
pub fn can_arithmetic(a: DataType, b: DataType) -> bool {
    match (a, b) {
        (DataType::Json, DataType::Json) => false,
        (DataType::Json, t) | (t, DataType::Json) => t.is_arithmetic(),
        (a, b) => a.is_arithmetic() && b.is_arithmetic(),
    }
}

/// Result type of an arithmetic node.
pub fn cal_data_type(a: &TypedExpr, b: &TypedExpr) -> Result<DataType, CompileError> {
    let element = |e: &TypedExpr| {
        if e.dtype.is_array() {
            e.array_element_type()
        } else {
            e.dtype
        }
    };
    let (a_type, b_type) = (element(a), element(b));
    let promoted = match (a_type, b_type) {
        (DataType::Json, DataType::Json) => Some(DataType::Json),
        (DataType::Json, t) | (t, DataType::Json) if t.is_floating() => Some(DataType::Double),
        (DataType::Json, t) | (t, DataType::Json) if t.is_integer() => Some(DataType::Int64),
        (x, y) if x.is_floating() && y.is_arithmetic() => Some(DataType::Double),
        (x, y) if x.is_integer() && y.is_floating() => Some(DataType::Double),
        (x, y) if x.is_integer() && y.is_integer() => Some(DataType::Int64),
        _ => None,
    };
    promoted.ok_or_else(|| {
        CompileError::new(format!(
            "arithmetic between {a_type} and {b_type} is not supported"
        ))
    })
}

/// Cast a literal to the type of the column it is compared against. Only
/// integer-to-float widening changes the value; every other mismatch fails.
pub fn cast_value(dtype: DataType, value: &ScalarValue) -> Result<ScalarValue, CompileError> {
    let cast = match (dtype, value) {
        (DataType::Json, v) => Some(v.clone()),
        (DataType::Array, v @ ScalarValue::Array(_)) => Some(v.clone()),
        (t, v @ ScalarValue::String(_)) if t.is_string() => Some(v.clone()),
        (DataType::Bool, v @ ScalarValue::Bool(_)) => Some(v.clone()),
        (t, v @ ScalarValue::Float64(_)) if t.is_floating() => Some(v.clone()),
        (t, ScalarValue::Int64(i)) if t.is_floating() => Some(ScalarValue::Float64(*i as f64)),
        (t, v @ ScalarValue::Int64(_)) if t.is_integer() => Some(v.clone()),
        _ => None,
    };
    cast.ok_or_else(|| CompileError::new(format!("cannot cast value {value} to {dtype}")))
}

/// Cast each element of an array literal.
pub fn cast_array(dtype: DataType, array: &ArrayValue) -> Result<Vec<ScalarValue>, CompileError> {
    array.values.iter().map(|v| cast_value(dtype, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnRef;

    fn column(dtype: DataType, element: DataType) -> TypedExpr {
        TypedExpr::column(ColumnRef {
            field_id: 100,
            data_type: dtype,
            element_type: element,
            nested_path: Vec::new(),
            is_primary_key: false,
            is_autoid: false,
        })
    }

    #[test]
    fn test_comparability_table() {
        assert!(can_be_compared_type(DataType::Int8, DataType::Double));
        assert!(can_be_compared_type(DataType::Bool, DataType::Json));
        assert!(can_be_compared_type(DataType::Json, DataType::FloatVector));
        assert!(!can_be_compared_type(DataType::VarChar, DataType::Int64));
        assert!(!can_be_compared_type(DataType::Bool, DataType::Int64));
        assert!(!can_be_compared_type(DataType::FloatVector, DataType::Json));
    }

    #[test]
    fn test_array_compares_by_element() {
        let tags = column(DataType::Array, DataType::VarChar);
        let s = TypedExpr::value(ScalarValue::String("x".into()));
        let n = TypedExpr::value(ScalarValue::Int64(1));
        assert!(can_be_compared(&tags, &s));
        assert!(!can_be_compared(&tags, &n));
    }

    #[test]
    fn test_promotion() {
        let int = column(DataType::Int32, DataType::None);
        let float = column(DataType::Float, DataType::None);
        let json = column(DataType::Json, DataType::None);
        assert_eq!(cal_data_type(&int, &int).unwrap(), DataType::Int64);
        assert_eq!(cal_data_type(&int, &float).unwrap(), DataType::Double);
        assert_eq!(cal_data_type(&json, &float).unwrap(), DataType::Double);
        assert_eq!(cal_data_type(&json, &int).unwrap(), DataType::Int64);
        assert_eq!(cal_data_type(&json, &json).unwrap(), DataType::Json);
        let text = column(DataType::VarChar, DataType::None);
        assert!(cal_data_type(&text, &int).is_err());
        assert!(!can_arithmetic(DataType::Json, DataType::Json));
        assert!(can_arithmetic(DataType::Json, DataType::Int64));
    }

    #[test]
    fn test_cast_value() {
        assert_eq!(
            cast_value(DataType::Double, &ScalarValue::Int64(3)).unwrap(),
            ScalarValue::Float64(3.0)
        );
        assert!(cast_value(DataType::Int64, &ScalarValue::Float64(3.5)).is_err());
        assert!(cast_value(DataType::Bool, &ScalarValue::Int64(1)).is_err());
        assert_eq!(
            cast_value(DataType::Json, &ScalarValue::Bool(true)).unwrap(),
            ScalarValue::Bool(true)
        );
        assert!(cast_value(DataType::VarChar, &ScalarValue::Int64(1)).is_err());
    }
}
