//! Field and function definitions.

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

/// Key of the vector dimension parameter.
pub const DIM_KEY: &str = "dim";
/// Key of the metric parameter in type/index params.
pub const METRIC_TYPE_KEY: &str = "metric_type";
/// Key of the analyzer configuration on a BM25 input field.
pub const ANALYZER_PARAMS_KEY: &str = "analyzer_params";

/// Ordered key/value parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        KeyValuePair {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Look up the first value stored under `key`.
pub fn find_param<'a>(params: &'a [KeyValuePair], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|kv| kv.key == key)
        .map(|kv| kv.value.as_str())
}

/// A single column of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub field_id: i64,
    pub name: String,
    pub data_type: DataType,
    /// Element type of an `Array` field, `None` otherwise.
    #[serde(default)]
    pub element_type: DataType,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub autoid: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub type_params: Vec<KeyValuePair>,
    #[serde(default)]
    pub index_params: Vec<KeyValuePair>,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
}

impl FieldSchema {
    pub fn new<S: Into<String>>(field_id: i64, name: S, data_type: DataType) -> Self {
        FieldSchema {
            field_id,
            name: name.into(),
            data_type,
            element_type: DataType::None,
            is_primary_key: false,
            is_dynamic: false,
            autoid: false,
            nullable: false,
            type_params: Vec::new(),
            index_params: Vec::new(),
            default_value: None,
        }
    }

    /// Mark the field as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Mark the field as auto-generated.
    pub fn autoid(mut self) -> Self {
        self.autoid = true;
        self
    }

    /// Mark the field as the dynamic JSON field.
    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_element_type(mut self, element_type: DataType) -> Self {
        self.element_type = element_type;
        self
    }

    pub fn with_dim(self, dim: i64) -> Self {
        self.with_type_param(DIM_KEY, dim.to_string())
    }

    pub fn with_type_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.type_params.push(KeyValuePair::new(key, value));
        self
    }

    pub fn with_index_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.index_params.push(KeyValuePair::new(key, value));
        self
    }

    pub fn type_param(&self, key: &str) -> Option<&str> {
        find_param(&self.type_params, key)
    }

    pub fn index_param(&self, key: &str) -> Option<&str> {
        find_param(&self.index_params, key)
    }

    pub fn is_vector(&self) -> bool {
        self.data_type.is_vector()
    }
}

/// Kind of a schema-registered transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FunctionType {
    #[default]
    Unknown,
    BM25,
}

/// A transform that derives output fields from input fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub function_type: FunctionType,
    pub input_field_names: Vec<String>,
    pub output_field_names: Vec<String>,
    #[serde(default)]
    pub params: Vec<KeyValuePair>,
}

impl FunctionSchema {
    pub fn new<S: Into<String>>(name: S, function_type: FunctionType) -> Self {
        FunctionSchema {
            name: name.into(),
            function_type,
            input_field_names: Vec::new(),
            output_field_names: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Convenience constructor for a BM25 transform `input -> output`.
    pub fn bm25<S: Into<String>>(name: S, input: &str, output: &str) -> Self {
        let mut function = FunctionSchema::new(name, FunctionType::BM25);
        function.input_field_names.push(input.to_string());
        function.output_field_names.push(output.to_string());
        function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_builder() {
        let field = FieldSchema::new(101, "vec", DataType::FloatVector)
            .with_dim(8)
            .with_index_param(METRIC_TYPE_KEY, "IP");
        assert_eq!(field.type_param(DIM_KEY), Some("8"));
        assert_eq!(field.index_param(METRIC_TYPE_KEY), Some("IP"));
        assert!(field.is_vector());
        assert!(!field.is_primary_key);
    }

    #[test]
    fn test_field_deserialize_defaults() {
        let field: FieldSchema =
            serde_json::from_str(r#"{"field_id": 100, "name": "id", "data_type": "Int64"}"#)
                .unwrap();
        assert_eq!(field.element_type, DataType::None);
        assert!(field.type_params.is_empty());
    }

    #[test]
    fn test_bm25_function() {
        let function = FunctionSchema::bm25("bm25", "text", "sparse");
        assert_eq!(function.function_type, FunctionType::BM25);
        assert_eq!(function.input_field_names, vec!["text"]);
        assert_eq!(function.output_field_names, vec!["sparse"]);
    }
}
