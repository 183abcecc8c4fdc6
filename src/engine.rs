//! Collaborators a [`Node`](crate::node::Node) runs against.
//!
//! The node compiles requests and shapes responses; storing rows, computing
//! nearest neighbours and persisting schemas belong to the implementations of
//! these traits. [`MemorySchemaStore`] is a ready-made schema registry.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::data::{FieldData, Ids, RetrieveResult, SearchResultData};
use crate::error::{Result, VecnodeError};
use crate::schema::{CollectionSchema, IndexMeta};

/// Source of collection schemas and their index metadata.
pub trait SchemaStore: Send + Sync + std::fmt::Debug {
    /// Schema snapshot of `collection`, or `CollectionNotFound`.
    fn get_schema(&self, collection: &str) -> Result<Arc<CollectionSchema>>;

    /// Index descriptors of every indexed field of `collection`.
    fn get_indexes(&self, collection: &str) -> Result<Vec<IndexMeta>>;
}

/// Executes serialized plans.
///
/// Both calls block until the engine answers. Failures are reported as
/// `SegcoreErr` and passed on unchanged.
pub trait ExecutionEngine: Send + Sync + std::fmt::Debug {
    /// Run a vector search plan over the encoded placeholder group.
    fn search(&self, collection: &str, plan: &[u8], placeholder_group: &[u8]) -> Result<SearchResultData>;

    /// Run a retrieve plan.
    fn retrieve(&self, collection: &str, plan: &[u8]) -> Result<RetrieveResult>;
}

/// Applies row mutations.
pub trait RowWriter: Send + Sync + std::fmt::Debug {
    /// Insert a batch of columns, returning the primary keys of the new rows.
    fn insert(&self, collection: &str, fields: &[FieldData]) -> Result<Ids>;

    /// Delete the rows with the given primary keys.
    fn delete(&self, collection: &str, ids: &Ids) -> Result<()>;
}

#[derive(Debug, Clone)]
struct CollectionEntry {
    schema: Arc<CollectionSchema>,
    indexes: Vec<IndexMeta>,
}

/// Schemas and indexes kept in process memory.
#[derive(Debug, Default)]
pub struct MemorySchemaStore {
    collections: RwLock<AHashMap<String, CollectionEntry>>,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_collection(&self, schema: CollectionSchema) -> Result<()> {
        schema.validate()?;
        let mut collections = self.collections.write();
        if collections.contains_key(&schema.name) {
            return Err(VecnodeError::parameter_invalid(format!(
                "Collection {} already exists",
                schema.name
            )));
        }
        collections.insert(
            schema.name.clone(),
            CollectionEntry {
                schema: Arc::new(schema),
                indexes: Vec::new(),
            },
        );
        Ok(())
    }

    /// Register an index, replacing any earlier index on the same field.
    pub fn add_index(&self, collection: &str, index: IndexMeta) -> Result<()> {
        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| VecnodeError::collection_not_found(collection))?;
        if entry.schema.field_by_id(index.field_id).is_none() {
            return Err(VecnodeError::field_not_found(format!(
                "field id {} of collection {collection}",
                index.field_id
            )));
        }
        entry.indexes.retain(|existing| existing.field_id != index.field_id);
        entry.indexes.push(index);
        Ok(())
    }

    pub fn drop_collection(&self, collection: &str) -> bool {
        self.collections.write().remove(collection).is_some()
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl SchemaStore for MemorySchemaStore {
    fn get_schema(&self, collection: &str) -> Result<Arc<CollectionSchema>> {
        self.collections
            .read()
            .get(collection)
            .map(|entry| Arc::clone(&entry.schema))
            .ok_or_else(|| VecnodeError::collection_not_found(collection))
    }

    fn get_indexes(&self, collection: &str) -> Result<Vec<IndexMeta>> {
        self.collections
            .read()
            .get(collection)
            .map(|entry| entry.indexes.clone())
            .ok_or_else(|| VecnodeError::collection_not_found(collection))
    }
}
