//! Node-wide limits and defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Largest `topk`, `limit` and `offset + limit` accepted by any task.
pub const TOPK_LIMIT: i64 = 16384;
/// Field ids below this value are reserved for system columns.
pub const START_OF_USER_FIELD_ID: i64 = 100;
/// Field id of the implicit row-id column.
pub const ROW_ID_FIELD_ID: i64 = 0;
/// Field id of the implicit timestamp column.
pub const TIMESTAMP_FIELD_ID: i64 = 1;
/// Storage name of the dynamic JSON field.
pub const META_FIELD_NAME: &str = "$meta";
/// Tag attached to every search placeholder.
pub const PLACEHOLDER_TAG: &str = "$0";
/// Output field sentinel that turns a query into a count.
pub const COUNT_STR: &str = "count(*)";
/// Default RRF smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;
/// Tokens longer than this many bytes are truncated before hashing.
pub const MAX_TOKEN_BYTES: usize = 100;

/// Configuration of a [`Node`](crate::node::Node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Upper bound for topk / limit / offset.
    pub topk_limit: i64,
    /// RRF constant used when a hybrid request gives no rank params.
    pub default_rrf_k: f64,
    /// Byte length tokens are truncated to before hashing.
    pub max_token_bytes: usize,
    /// First field id handed to user fields.
    pub start_of_user_field_id: i64,
    /// Average document length advertised for new BM25 indexes.
    pub bm25_default_avgdl: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            topk_limit: TOPK_LIMIT,
            default_rrf_k: DEFAULT_RRF_K,
            max_token_bytes: MAX_TOKEN_BYTES,
            start_of_user_field_id: START_OF_USER_FIELD_ID,
            bm25_default_avgdl: 10000.0,
        }
    }
}

impl NodeConfig {
    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the configuration as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
