//! # vecnode
//!
//! Query front end of an embedded vector database node.
//!
//! Filter strings are compiled into typed expression trees, query, search,
//! delete and hybrid search requests are validated and turned into engine
//! plans, and the engine's columnar answers are paginated, deduplicated,
//! fused and annotated before they go back to the client. Collections with
//! BM25 functions get their text encoded into sparse vectors and their corpus
//! statistics kept in step with inserts and deletes.
//!
//! ## Modules
//!
//! - [`expr`]: filter lexer, parser and typed expression compiler
//! - [`task`]: per-request Process / PostProcess tasks
//! - [`rank`]: RRF and weighted rank fusion
//! - [`function`], [`analysis`], [`stats`]: BM25 encoding and statistics
//! - [`node`]: the orchestrator wiring tasks to an [`engine`]

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod expr;
pub mod function;
pub mod node;
pub mod output_fields;
pub mod plan;
pub mod rank;
pub mod schema;
pub mod stats;
pub mod task;

pub mod prelude {
    pub use crate::data::{FieldData, FieldValues, Ids, Placeholder, PlaceholderGroup, PrimaryKey};
    pub use crate::engine::{ExecutionEngine, MemorySchemaStore, RowWriter, SchemaStore};
    pub use crate::error::{Result, VecnodeError};
    pub use crate::node::Node;
    pub use crate::schema::{CollectionSchema, DataType, FieldSchema, FunctionSchema, IndexMeta};
    pub use crate::stats::{MemoryStatsStore, StatsStore};
    pub use crate::task::{
        DeleteRequest, HybridSearchRequest, QueryRequest, SearchRequest,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
