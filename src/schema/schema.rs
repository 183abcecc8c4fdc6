//! Collection schema definition.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::config::{META_FIELD_NAME, START_OF_USER_FIELD_ID};
use crate::error::{Result, VecnodeError};
use crate::schema::DataType;
use crate::schema::field::{FieldSchema, FunctionSchema};

/// A collection schema: ordered fields, registered functions and the
/// dynamic-field switch.
///
/// Field names are unique, at most one field is the primary key and at most
/// one field is the dynamic JSON field. These invariants are enforced by
/// [`CollectionSchema::add_field`] and re-checked by [`CollectionSchema::validate`]
/// for schemas that were deserialized directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    fields: Vec<FieldSchema>,
    #[serde(default)]
    functions: Vec<FunctionSchema>,
    #[serde(default)]
    pub enable_dynamic_field: bool,
}

impl CollectionSchema {
    /// Create a new empty schema.
    pub fn new<S: Into<String>>(name: S) -> Self {
        CollectionSchema {
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
            functions: Vec::new(),
            enable_dynamic_field: false,
        }
    }

    /// Add a field to the schema.
    pub fn add_field(&mut self, field: FieldSchema) -> Result<()> {
        if field.name.is_empty() {
            return Err(VecnodeError::illegal_schema("Field name cannot be empty"));
        }
        if self.field(&field.name).is_some() {
            return Err(VecnodeError::illegal_schema(format!(
                "Field '{}' already exists",
                field.name
            )));
        }
        if field.is_primary_key && self.primary_key().is_some() {
            return Err(VecnodeError::illegal_schema(format!(
                "Field '{}' cannot be a second primary key",
                field.name
            )));
        }
        if field.is_dynamic {
            if !field.data_type.is_json() {
                return Err(VecnodeError::illegal_schema(format!(
                    "Dynamic field '{}' must be JSON",
                    field.name
                )));
            }
            if self.dynamic_field().is_some() {
                return Err(VecnodeError::illegal_schema(
                    "At most one dynamic field is allowed",
                ));
            }
        }

        self.fields.push(field);
        Ok(())
    }

    /// Register a transform function. Its input and output fields must exist.
    pub fn add_function(&mut self, function: FunctionSchema) -> Result<()> {
        for name in function
            .input_field_names
            .iter()
            .chain(function.output_field_names.iter())
        {
            if self.field(name).is_none() {
                return Err(VecnodeError::illegal_schema(format!(
                    "Function '{}' references unknown field '{name}'",
                    function.name
                )));
            }
        }
        self.functions.push(function);
        Ok(())
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn functions(&self) -> &[FunctionSchema] {
        &self.functions
    }

    /// Get a field by exact name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_id(&self, field_id: i64) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    pub fn primary_key(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary_key)
    }

    /// The dynamic JSON field, if dynamic fields are enabled.
    pub fn dynamic_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_dynamic)
    }

    /// Fields visible to users (id at or above the first user field id).
    pub fn user_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields
            .iter()
            .filter(|f| f.field_id >= START_OF_USER_FIELD_ID)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_vector())
    }

    /// Names of fields produced by registered functions.
    pub fn function_output_fields(&self) -> AHashSet<&str> {
        self.functions
            .iter()
            .flat_map(|f| f.output_field_names.iter().map(String::as_str))
            .collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Re-check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        let mut names = AHashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(VecnodeError::illegal_schema(format!(
                    "Duplicated field name '{}'",
                    field.name
                )));
            }
        }
        if self.fields.iter().filter(|f| f.is_primary_key).count() > 1 {
            return Err(VecnodeError::illegal_schema("More than one primary key"));
        }
        if self.fields.iter().filter(|f| f.is_dynamic).count() > 1 {
            return Err(VecnodeError::illegal_schema(
                "At most one dynamic field is allowed",
            ));
        }
        Ok(())
    }

    /// Parse and validate a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: CollectionSchema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Create a builder for constructing schemas.
    pub fn builder<S: Into<String>>(name: S) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }
}

/// Builder for [`CollectionSchema`].
pub struct SchemaBuilder {
    schema: CollectionSchema,
    pending: Vec<FieldSchema>,
    functions: Vec<FunctionSchema>,
}

impl SchemaBuilder {
    pub fn new<S: Into<String>>(name: S) -> Self {
        SchemaBuilder {
            schema: CollectionSchema::new(name),
            pending: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.pending.push(field);
        self
    }

    pub fn function(mut self, function: FunctionSchema) -> Self {
        self.functions.push(function);
        self
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.schema.description = description.into();
        self
    }

    /// Enable dynamic fields. A caller that does not add its own dynamic
    /// field gets a `$meta` JSON field appended at build time.
    pub fn enable_dynamic_field(mut self) -> Self {
        self.schema.enable_dynamic_field = true;
        self
    }

    pub fn build(self) -> Result<CollectionSchema> {
        let mut schema = self.schema;
        let mut next_id = START_OF_USER_FIELD_ID;
        for field in self.pending {
            next_id = next_id.max(field.field_id + 1);
            schema.add_field(field)?;
        }
        if schema.enable_dynamic_field && schema.dynamic_field().is_none() {
            schema.add_field(FieldSchema::new(next_id, META_FIELD_NAME, DataType::Json).dynamic())?;
        }
        for function in self.functions {
            schema.add_function(function)?;
        }
        Ok(schema)
    }
}
