//! Output field list expansion.

use std::collections::BTreeSet;

use crate::config::{META_FIELD_NAME, START_OF_USER_FIELD_ID};
use crate::error::{Result, VecnodeError};
use crate::schema::{CollectionSchema, SchemaResolver};

/// Fields to fetch from the engine and the names to report them under.
///
/// The two lists differ only when dynamic keys are requested: the engine
/// returns the whole dynamic field while the client sees each key it asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFields {
    /// Storage field names, sorted.
    pub result_fields: Vec<String>,
    /// User-facing names, sorted.
    pub user_fields: Vec<String>,
}

/// Expand a raw output field list against `schema`.
///
/// `*` stands for every user field. Unknown names are looked up as keys of
/// the dynamic field when the schema has one and fail with `FieldNotFound`
/// otherwise. Outputs of schema functions are never returned.
pub fn translate_output_fields<S: AsRef<str>>(
    raw_fields: &[S],
    schema: &CollectionSchema,
    add_primary_key: bool,
) -> Result<OutputFields> {
    let all_fields: BTreeSet<&str> = schema
        .fields()
        .iter()
        .filter(|f| f.field_id >= START_OF_USER_FIELD_ID)
        .map(|f| f.name.as_str())
        .collect();

    let mut result_fields = BTreeSet::new();
    let mut user_fields = BTreeSet::new();

    for raw in raw_fields {
        let name = raw.as_ref().trim();
        if name == "*" {
            for field in &all_fields {
                result_fields.insert(field.to_string());
                user_fields.insert(field.to_string());
            }
        } else if all_fields.contains(name) {
            result_fields.insert(name.to_string());
            user_fields.insert(name.to_string());
        } else if schema.enable_dynamic_field {
            let column = SchemaResolver::new(schema).resolve_identifier(name)?;
            if column.nested_path.len() != 1 || column.nested_path[0] != name {
                return Err(VecnodeError::field_not_found(format!(
                    "Field {name} not exist"
                )));
            }
            result_fields.insert(META_FIELD_NAME.to_string());
            user_fields.insert(name.to_string());
        } else {
            return Err(VecnodeError::field_not_found(format!(
                "Field {name} not exist"
            )));
        }
    }

    if add_primary_key {
        let pk = SchemaResolver::new(schema).primary_key()?;
        result_fields.insert(pk.name.clone());
        user_fields.insert(pk.name.clone());
    }

    for derived in schema.function_output_fields() {
        result_fields.remove(derived);
        user_fields.remove(derived);
    }

    Ok(OutputFields {
        result_fields: result_fields.into_iter().collect(),
        user_fields: user_fields.into_iter().collect(),
    })
}

/// Field ids of `names`, in order.
pub fn field_ids<S: AsRef<str>>(names: &[S], schema: &CollectionSchema) -> Result<Vec<i64>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            schema.field(name).map(|f| f.field_id).ok_or_else(|| {
                VecnodeError::parameter_invalid(format!(
                    "Can not find output field {name} in schema"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldSchema, FunctionSchema};

    fn schema(dynamic: bool) -> CollectionSchema {
        let mut builder = CollectionSchema::builder("docs")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "text", DataType::VarChar))
            .field(FieldSchema::new(102, "sparse", DataType::SparseFloatVector))
            .field(FieldSchema::new(103, "dense", DataType::FloatVector).with_dim(4))
            .function(FunctionSchema::bm25("bm25", "text", "sparse"));
        if dynamic {
            builder = builder.enable_dynamic_field();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_wildcard_skips_function_outputs() {
        let out = translate_output_fields(&["*"], &schema(false), false).unwrap();
        assert_eq!(out.result_fields, vec!["dense", "id", "text"]);
        assert_eq!(out.user_fields, out.result_fields);
    }

    #[test]
    fn test_explicit_and_primary_key() {
        let out = translate_output_fields(&[" text ", "text"], &schema(false), true).unwrap();
        assert_eq!(out.result_fields, vec!["id", "text"]);

        let out = translate_output_fields(&["sparse"], &schema(false), false).unwrap();
        assert!(out.result_fields.is_empty());
    }

    #[test]
    fn test_dynamic_keys() {
        let out = translate_output_fields(&["color", "text"], &schema(true), false).unwrap();
        assert_eq!(out.result_fields, vec![META_FIELD_NAME, "text"]);
        assert_eq!(out.user_fields, vec!["color", "text"]);

        let err = translate_output_fields(&[r#"color["x"]"#], &schema(true), false).unwrap_err();
        assert!(matches!(err, VecnodeError::FieldNotFound(_)));
    }

    #[test]
    fn test_field_ids() {
        assert_eq!(field_ids(&["text", "id"], &schema(false)).unwrap(), vec![101, 100]);
        assert!(field_ids(&["color"], &schema(false)).is_err());
    }

    #[test]
    fn test_unknown_field_without_dynamic() {
        let err = translate_output_fields(&["color"], &schema(false), false).unwrap_err();
        assert!(matches!(err, VecnodeError::FieldNotFound(_)));
    }
}
