//! BM25 text-to-sparse transform.
//!
//! Every token is truncated to `max_token_bytes`, hashed with CRC-32 into a
//! `u32` token id and counted; a document becomes the sparse vector of its
//! term frequencies. Queries go through the exact same path so that their
//! token ids line up with the indexed documents.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;

use crate::analysis::Analyzer;
use crate::config::{MAX_TOKEN_BYTES, PLACEHOLDER_TAG};
use crate::data::{FieldData, FieldValues, Placeholder, PlaceholderGroup, PlaceholderType};
use crate::error::{Result, VecnodeError};
use crate::function::Function;
use crate::function::sparse::{SparseVector, encode_sparse};
use crate::schema::field::ANALYZER_PARAMS_KEY;
use crate::schema::{CollectionSchema, DataType, FieldSchema, FunctionSchema};

/// Token id of `token`: CRC-32 of at most `max_bytes` leading bytes.
pub fn token_id(token: &str, max_bytes: usize) -> u32 {
    let bytes = token.as_bytes();
    crc32fast::hash(&bytes[..bytes.len().min(max_bytes)])
}

fn function_field<'a>(
    schema: &'a CollectionSchema,
    function: &FunctionSchema,
    name: &str,
) -> Result<&'a FieldSchema> {
    schema.field(name).ok_or_else(|| {
        VecnodeError::field_not_found(format!(
            "Function {} references unknown field {name}",
            function.name
        ))
    })
}

#[derive(Debug)]
pub struct Bm25Function {
    name: String,
    input_fields: Vec<String>,
    output_fields: Vec<String>,
    output_field_id: i64,
    analyzer: Analyzer,
    max_token_bytes: usize,
    /// Widest document seen so far; reported as the output column's dim.
    dim: AtomicUsize,
}

impl Bm25Function {
    /// Validate `function` against `schema` and build its analyzer from the
    /// input field's `analyzer_params`.
    pub fn new(schema: &CollectionSchema, function: &FunctionSchema) -> Result<Self> {
        if function.output_field_names.len() != 1 {
            return Err(VecnodeError::parameter_invalid(format!(
                "BM25 function only supports one output, but got {}",
                function.output_field_names.len()
            )));
        }
        if function.input_field_names.len() != 1 {
            return Err(VecnodeError::parameter_invalid(format!(
                "BM25 function only supports one input, but got {}",
                function.input_field_names.len()
            )));
        }

        let input = function_field(schema, function, &function.input_field_names[0])?;
        let output = function_field(schema, function, &function.output_field_names[0])?;

        if input.data_type != DataType::VarChar {
            return Err(VecnodeError::parameter_invalid(format!(
                "BM25 function only supports varchar input, but got {}",
                input.data_type
            )));
        }
        if output.data_type != DataType::SparseFloatVector {
            return Err(VecnodeError::parameter_invalid(format!(
                "BM25 function only supports sparse vector output, but got {}",
                output.data_type
            )));
        }

        let analyzer =
            Analyzer::from_params(input.type_param(ANALYZER_PARAMS_KEY).unwrap_or(""))?;
        debug!(
            "bm25 function {} on {} -> {} uses analyzer {analyzer:?}",
            function.name, input.name, output.name
        );

        Ok(Bm25Function {
            name: function.name.clone(),
            input_fields: function.input_field_names.clone(),
            output_fields: function.output_field_names.clone(),
            output_field_id: output.field_id,
            analyzer,
            max_token_bytes: MAX_TOKEN_BYTES,
            dim: AtomicUsize::new(0),
        })
    }

    pub fn with_max_token_bytes(mut self, max_token_bytes: usize) -> Self {
        self.max_token_bytes = max_token_bytes;
        self
    }

    /// Term-frequency vector of one document.
    pub fn embed(&self, doc: &str) -> Result<SparseVector> {
        let mut embedding = SparseVector::new();
        for token in self.analyzer.analyze(doc)? {
            *embedding
                .entry(token_id(&token.text, self.max_token_bytes))
                .or_insert(0.0) += 1.0;
        }
        Ok(embedding)
    }

    /// Largest distinct-token count seen across every batch so far.
    pub fn dim(&self) -> usize {
        self.dim.load(Ordering::Relaxed)
    }
}

impl Function for Bm25Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_field_names(&self) -> &[String] {
        &self.input_fields
    }

    fn output_field_names(&self) -> &[String] {
        &self.output_fields
    }

    fn process_insert(&self, inputs: &[&FieldData]) -> Result<Vec<FieldData>> {
        if inputs.len() != 1 {
            return Err(VecnodeError::parameter_invalid(
                "BM25Function inputs size must be 1",
            ));
        }
        if inputs[0].data_type != DataType::VarChar {
            return Err(VecnodeError::parameter_invalid(
                "BM25Function input type must be VarChar",
            ));
        }
        let FieldValues::String(docs) = &inputs[0].values else {
            return Err(VecnodeError::parameter_invalid(
                "BM25Function input data is not string",
            ));
        };

        let mut contents = Vec::with_capacity(docs.len());
        let mut batch_dim = 0;
        for doc in docs {
            let embedding = self.embed(doc)?;
            batch_dim = batch_dim.max(embedding.len());
            contents.push(encode_sparse(&embedding));
        }
        let dim = self.dim.fetch_max(batch_dim, Ordering::Relaxed).max(batch_dim);

        Ok(vec![FieldData::new(
            self.output_field_id,
            self.output_fields[0].clone(),
            DataType::SparseFloatVector,
            FieldValues::SparseFloatVector { dim, contents },
        )])
    }

    fn process_search(&self, input: &PlaceholderGroup) -> Result<PlaceholderGroup> {
        let placeholder = input
            .placeholders
            .first()
            .filter(|p| p.placeholder_type == PlaceholderType::VarChar)
            .ok_or_else(|| {
                VecnodeError::parameter_invalid("BM25 function error, the input is not varchar")
            })?;

        let mut output = Placeholder::new(PLACEHOLDER_TAG, PlaceholderType::SparseFloatVector);
        for raw in &placeholder.values {
            let text = std::str::from_utf8(raw).map_err(|e| {
                VecnodeError::parameter_invalid(format!("search text is not utf-8: {e}"))
            })?;
            output.values.push(encode_sparse(&self.embed(text)?));
        }
        Ok(PlaceholderGroup::single(output))
    }
}
