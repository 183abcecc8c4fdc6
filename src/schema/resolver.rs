//! Name resolution against a collection schema.
//!
//! [`SchemaResolver`] turns identifiers found in filters and output-field lists
//! into [`ColumnRef`]s. Names that match no static field fall through to the
//! dynamic JSON field when the schema has one, in which case the name becomes
//! the first segment of the nested path.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecnodeError};
use crate::schema::field::DIM_KEY;
use crate::schema::{CollectionSchema, DataType, FieldSchema};

/// A resolved reference to a schema column, possibly into a JSON or array
/// sub-path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub field_id: i64,
    pub data_type: DataType,
    pub element_type: DataType,
    /// Object keys and array indexes, outermost first.
    pub nested_path: Vec<String>,
    pub is_primary_key: bool,
    pub is_autoid: bool,
}

impl ColumnRef {
    pub fn from_field(field: &FieldSchema) -> Self {
        ColumnRef {
            field_id: field.field_id,
            data_type: field.data_type,
            element_type: field.element_type,
            nested_path: Vec::new(),
            is_primary_key: field.is_primary_key,
            is_autoid: field.autoid,
        }
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.nested_path = path;
        self
    }

    pub fn is_nested(&self) -> bool {
        !self.nested_path.is_empty()
    }

    /// A whole Array column, which cannot take part in scalar comparisons.
    pub fn is_bare_array(&self) -> bool {
        self.data_type.is_array() && self.nested_path.is_empty()
    }

    /// Type the column's values compare as: the element type for an
    /// addressed array element, the declared type otherwise.
    pub fn value_type(&self) -> DataType {
        if self.data_type.is_array() && self.is_nested() {
            self.element_type
        } else {
            self.data_type
        }
    }
}

/// Read-only resolver over a schema snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'a> {
    schema: &'a CollectionSchema,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(schema: &'a CollectionSchema) -> Self {
        SchemaResolver { schema }
    }

    pub fn schema(&self) -> &'a CollectionSchema {
        self.schema
    }

    /// Exact field, or the dynamic field when the name is unknown.
    fn field_or_dynamic(&self, name: &str) -> Result<&'a FieldSchema> {
        self.schema
            .field(name)
            .or_else(|| self.schema.dynamic_field())
            .ok_or_else(|| VecnodeError::field_not_found(format!("field {name} not exist")))
    }

    /// Resolve a plain identifier.
    pub fn resolve(&self, name: &str) -> Result<ColumnRef> {
        let field = self.field_or_dynamic(name)?;
        let column = ColumnRef::from_field(field);
        if field.name == name {
            Ok(column)
        } else {
            Ok(column.with_path(vec![name.to_string()]))
        }
    }

    /// Resolve a compound identifier such as `info["a"][0]["b"]`, given as the
    /// field prefix (`info`) and the bracket suffix (`["a"][0]["b"]`).
    pub fn resolve_path(&self, field_prefix: &str, bracket_suffix: &str) -> Result<ColumnRef> {
        let field = self.field_or_dynamic(field_prefix)?;
        if !field.data_type.is_json() && !field.data_type.is_array() {
            return Err(VecnodeError::parameter_invalid(format!(
                "field {} of type {} does not support nested access",
                field.name, field.data_type
            )));
        }

        let mut path = Vec::new();
        if field.name != field_prefix {
            path.push(field_prefix.to_string());
        }
        path.extend(parse_bracket_path(bracket_suffix)?);
        Ok(ColumnRef::from_field(field).with_path(path))
    }

    /// Resolve `identifier` in either plain or bracketed form.
    pub fn resolve_identifier(&self, identifier: &str) -> Result<ColumnRef> {
        match identifier.find('[') {
            Some(pos) if pos > 0 => self.resolve_path(&identifier[..pos], &identifier[pos..]),
            _ => self.resolve(identifier),
        }
    }

    pub fn primary_key(&self) -> Result<&'a FieldSchema> {
        self.schema
            .primary_key()
            .ok_or_else(|| VecnodeError::illegal_schema("Can not find primary key"))
    }

    /// The vector field named `name`, or the sole vector field when `name` is empty.
    pub fn vector_field(&self, name: &str) -> Result<&'a FieldSchema> {
        let mut vectors = self.schema.vector_fields();
        if name.is_empty() {
            let first = vectors
                .next()
                .ok_or_else(|| VecnodeError::parameter_invalid("Schema has no vector field"))?;
            if vectors.next().is_some() {
                return Err(VecnodeError::parameter_invalid(
                    "multiple anns_fields exist, please specify a anns_field in search_params",
                ));
            }
            return Ok(first);
        }
        vectors.find(|f| f.name == name).ok_or_else(|| {
            VecnodeError::parameter_invalid(format!("fieldName({name}) not found"))
        })
    }

    /// Dimension of a dense vector field.
    pub fn dimension(&self, field: &FieldSchema) -> Result<i64> {
        if field.data_type == DataType::SparseFloatVector {
            return Err(VecnodeError::parameter_invalid(format!(
                "field {} is a sparse vector, its dimension depends on the data",
                field.name
            )));
        }
        let raw = field
            .type_param(DIM_KEY)
            .or_else(|| field.index_param(DIM_KEY))
            .ok_or_else(|| {
                VecnodeError::parameter_invalid(format!("field {} has no dim", field.name))
            })?;
        raw.trim().parse::<i64>().map_err(|_| {
            VecnodeError::parameter_invalid(format!("field {} has invalid dim {raw}", field.name))
        })
    }
}

/// Split `["a"][0]['b']` into `a`, `0`, `b`.
fn parse_bracket_path(suffix: &str) -> Result<Vec<String>> {
    let invalid = || VecnodeError::parameter_invalid(format!("invalid nested path {suffix}"));

    let mut segments = Vec::new();
    for raw in suffix.split("][") {
        let mut segment = raw.strip_prefix('[').unwrap_or(raw);
        segment = segment.strip_suffix(']').unwrap_or(segment);
        if segment.is_empty() {
            return Err(invalid());
        }
        let quoted = segment.len() >= 2
            && ((segment.starts_with('"') && segment.ends_with('"'))
                || (segment.starts_with('\'') && segment.ends_with('\'')));
        if quoted {
            segment = &segment[1..segment.len() - 1];
            if segment.is_empty() {
                return Err(invalid());
            }
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema(dynamic: bool) -> CollectionSchema {
        let mut builder = CollectionSchema::builder("c")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "info", DataType::Json))
            .field(
                FieldSchema::new(102, "tags", DataType::Array).with_element_type(DataType::VarChar),
            )
            .field(FieldSchema::new(103, "vec", DataType::FloatVector).with_dim(16))
            .field(FieldSchema::new(104, "sparse", DataType::SparseFloatVector));
        if dynamic {
            builder = builder.enable_dynamic_field();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_resolve_exact_field() {
        let schema = sample_schema(false);
        let resolver = SchemaResolver::new(&schema);
        let column = resolver.resolve("id").unwrap();
        assert_eq!(column.field_id, 100);
        assert!(column.is_primary_key);
        assert!(column.nested_path.is_empty());
    }

    #[test]
    fn test_unknown_name_goes_to_dynamic_field() {
        let schema = sample_schema(true);
        let column = SchemaResolver::new(&schema).resolve("unknown_name").unwrap();
        assert_eq!(column.data_type, DataType::Json);
        assert_eq!(column.nested_path, vec!["unknown_name"]);

        let schema = sample_schema(false);
        let err = SchemaResolver::new(&schema).resolve("unknown_name").unwrap_err();
        assert!(matches!(err, VecnodeError::FieldNotFound(_)));
    }

    #[test]
    fn test_resolve_path() {
        let schema = sample_schema(true);
        let resolver = SchemaResolver::new(&schema);

        let column = resolver.resolve_path("info", r#"["a"][0]['b']"#).unwrap();
        assert_eq!(column.field_id, 101);
        assert_eq!(column.nested_path, vec!["a", "0", "b"]);

        let column = resolver.resolve_identifier(r#"extra["k"]"#).unwrap();
        assert_eq!(column.nested_path, vec!["extra", "k"]);

        let column = resolver.resolve_identifier("tags[1]").unwrap();
        assert_eq!(column.value_type(), DataType::VarChar);
    }

    #[test]
    fn test_resolve_path_rejects_scalars_and_empty_keys() {
        let schema = sample_schema(false);
        let resolver = SchemaResolver::new(&schema);
        assert!(resolver.resolve_path("id", "[0]").is_err());
        assert!(resolver.resolve_path("info", r#"[""]"#).is_err());
        assert!(resolver.resolve_path("info", "[]").is_err());
    }

    #[test]
    fn test_vector_field_selection() {
        let schema = sample_schema(false);
        let resolver = SchemaResolver::new(&schema);
        assert_eq!(resolver.vector_field("vec").unwrap().field_id, 103);
        assert!(resolver.vector_field("").is_err());
        assert!(resolver.vector_field("missing").is_err());
    }

    #[test]
    fn test_dimension() {
        let schema = sample_schema(false);
        let resolver = SchemaResolver::new(&schema);
        let vec = schema.field("vec").unwrap();
        assert_eq!(resolver.dimension(vec).unwrap(), 16);
        let sparse = schema.field("sparse").unwrap();
        assert!(resolver.dimension(sparse).is_err());
    }
}
