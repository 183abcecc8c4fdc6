//! Request tasks.
//!
//! Every task is used in two phases against one schema snapshot: `process`
//! validates a request and builds the engine [`Plan`](crate::plan::Plan), and
//! `post_process` turns the engine's raw answer into the client response.
//! Tasks hold no shared state and may run concurrently.

pub mod delete;
pub mod hybrid;
pub mod params;
pub mod query;
pub mod request;
pub mod search;

pub use delete::DeleteTask;
pub use hybrid::HybridSearchTask;
pub use query::{QueryTask, is_count_request};
pub use request::{
    DeleteRequest, DeleteResults, HybridSearchRequest, InsertResults, QueryRequest, QueryResults,
    SearchRequest, SearchResults,
};
pub use search::{SearchTask, check_metric, positively_related};
