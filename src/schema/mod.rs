//! Collection schema, index metadata and name resolution.

pub mod data_type;
pub mod field;
pub mod index;
pub mod resolver;
#[allow(clippy::module_inception)]
pub mod schema;

pub use data_type::DataType;
pub use field::{FieldSchema, FunctionSchema, FunctionType, KeyValuePair, find_param};
pub use index::{IndexMeta, index_metric_for};
pub use resolver::{ColumnRef, SchemaResolver};
pub use schema::{CollectionSchema, SchemaBuilder};
