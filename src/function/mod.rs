//! Schema transform functions.
//!
//! A function derives output fields from input fields: at insert time it adds
//! columns to the batch, at search time it turns raw query input (such as
//! text) into the vectors the engine searches with.

pub mod bm25;
pub mod executor;
pub mod sparse;

pub use bm25::Bm25Function;
pub use executor::FunctionExecutor;
pub use sparse::{SparseVector, decode_sparse, encode_sparse};

use crate::data::{FieldData, PlaceholderGroup};
use crate::error::Result;

pub trait Function: Send + Sync {
    fn name(&self) -> &str;

    fn input_field_names(&self) -> &[String];

    fn output_field_names(&self) -> &[String];

    /// Output columns derived from the input columns of an insert batch.
    fn process_insert(&self, inputs: &[&FieldData]) -> Result<Vec<FieldData>>;

    /// Transform a search placeholder group.
    fn process_search(&self, input: &PlaceholderGroup) -> Result<PlaceholderGroup>;
}
