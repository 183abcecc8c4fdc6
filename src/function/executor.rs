//! Runs every schema function over insert batches and search placeholders.

use log::debug;

use crate::config::{MAX_TOKEN_BYTES, NodeConfig};
use crate::data::{FieldData, PlaceholderGroup};
use crate::error::{Result, VecnodeError};
use crate::function::Function;
use crate::function::bm25::Bm25Function;
use crate::schema::{CollectionSchema, FunctionSchema, FunctionType};

pub struct FunctionExecutor {
    functions: Vec<Box<dyn Function>>,
}

impl std::fmt::Debug for FunctionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.functions.iter().map(|function| function.name()))
            .finish()
    }
}

fn create_function(
    schema: &CollectionSchema,
    function: &FunctionSchema,
    max_token_bytes: usize,
) -> Result<Box<dyn Function>> {
    match function.function_type {
        FunctionType::BM25 => Ok(Box::new(
            Bm25Function::new(schema, function)?.with_max_token_bytes(max_token_bytes),
        )),
        other => Err(VecnodeError::parameter_invalid(format!(
            "Unsupported function: {other:?}"
        ))),
    }
}

impl FunctionExecutor {
    /// One function per schema function.
    pub fn new(schema: &CollectionSchema) -> Result<Self> {
        Self::with_max_token_bytes(schema, MAX_TOKEN_BYTES)
    }

    pub fn with_config(schema: &CollectionSchema, config: &NodeConfig) -> Result<Self> {
        Self::with_max_token_bytes(schema, config.max_token_bytes)
    }

    fn with_max_token_bytes(schema: &CollectionSchema, max_token_bytes: usize) -> Result<Self> {
        let functions = schema
            .functions()
            .iter()
            .map(|function| create_function(schema, function, max_token_bytes))
            .collect::<Result<Vec<_>>>()?;
        Ok(FunctionExecutor { functions })
    }

    /// Executor holding only the function that produces `field_name`.
    pub fn for_output(
        schema: &CollectionSchema,
        field_name: &str,
        config: &NodeConfig,
    ) -> Result<Self> {
        let function = schema
            .functions()
            .iter()
            .find(|f| f.output_field_names.first().map(String::as_str) == Some(field_name))
            .ok_or_else(|| {
                VecnodeError::parameter_invalid(format!("No function's output is {field_name}"))
            })?;
        Ok(FunctionExecutor {
            functions: vec![create_function(schema, function, config.max_token_bytes)?],
        })
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions(&self) -> &[Box<dyn Function>] {
        &self.functions
    }

    /// Append every function's output columns to `fields`.
    pub fn process_insert(&self, fields: &mut Vec<FieldData>) -> Result<()> {
        for function in &self.functions {
            let names = function.input_field_names();
            let inputs: Vec<&FieldData> = fields
                .iter()
                .filter(|field| names.contains(&field.field_name))
                .collect();
            let outputs = function.process_insert(&inputs)?;
            debug!(
                "function {} produced {} column(s)",
                function.name(),
                outputs.len()
            );
            fields.extend(outputs);
        }
        Ok(())
    }

    /// Transform a single-placeholder search through the first function.
    pub fn process_search(&self, group: &PlaceholderGroup) -> Result<PlaceholderGroup> {
        let function = self
            .functions
            .first()
            .ok_or_else(|| VecnodeError::internal("function executor has no function"))?;
        Self::run_search(function.as_ref(), group)
    }

    /// Transform a search on `output_field` through the function producing it.
    pub fn process_search_for(
        &self,
        output_field: &str,
        group: &PlaceholderGroup,
    ) -> Result<PlaceholderGroup> {
        let function = self
            .functions
            .iter()
            .find(|f| f.output_field_names().iter().any(|name| name == output_field))
            .ok_or_else(|| {
                VecnodeError::parameter_invalid(format!("No function's output is {output_field}"))
            })?;
        Self::run_search(function.as_ref(), group)
    }

    fn run_search(function: &dyn Function, group: &PlaceholderGroup) -> Result<PlaceholderGroup> {
        if group.placeholders.len() != 1 {
            return Err(VecnodeError::parameter_invalid(
                "placeholders size is not equal 1",
            ));
        }
        function.process_search(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FieldValues, Placeholder};
    use crate::schema::{DataType, FieldSchema};

    fn schema() -> CollectionSchema {
        CollectionSchema::builder("docs")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "text", DataType::VarChar))
            .field(FieldSchema::new(102, "sparse", DataType::SparseFloatVector))
            .function(FunctionSchema::bm25("bm25", "text", "sparse"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_process_insert_appends_output() {
        let executor = FunctionExecutor::new(&schema()).unwrap();
        let mut fields = vec![
            FieldData::new(100, "id", DataType::Int64, FieldValues::Long(vec![1, 2])),
            FieldData::new(
                101,
                "text",
                DataType::VarChar,
                FieldValues::String(vec!["hello world".into(), "hello".into()]),
            ),
        ];
        executor.process_insert(&mut fields).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[2].field_name, "sparse");
        assert_eq!(fields[2].len(), 2);
    }

    #[test]
    fn test_for_output() {
        assert!(FunctionExecutor::for_output(&schema(), "sparse", &NodeConfig::default()).is_ok());
        let err = FunctionExecutor::for_output(&schema(), "text", &NodeConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No function's output is text"));
    }

    #[test]
    fn test_unsupported_function() {
        let mut function = FunctionSchema::bm25("f", "text", "sparse");
        function.function_type = FunctionType::Unknown;
        let schema = CollectionSchema::builder("docs")
            .field(FieldSchema::new(101, "text", DataType::VarChar))
            .field(FieldSchema::new(102, "sparse", DataType::SparseFloatVector))
            .function(function)
            .build()
            .unwrap();
        let err = FunctionExecutor::new(&schema).unwrap_err();
        assert!(err.to_string().contains("Unsupported function"));
    }

    #[test]
    fn test_process_search_requires_one_placeholder() {
        let executor = FunctionExecutor::new(&schema()).unwrap();
        let mut group = PlaceholderGroup::single(Placeholder::texts("$0", &["hi"]));
        assert!(executor.process_search(&group).is_ok());

        assert!(executor.process_search_for("sparse", &group).is_ok());
        assert!(executor.process_search_for("text", &group).is_err());

        group.placeholders.push(Placeholder::texts("$1", &["there"]));
        assert!(executor.process_search(&group).is_err());
    }
}
