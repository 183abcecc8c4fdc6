//! Client requests and responses.

use serde::{Deserialize, Serialize};

use crate::data::{AnnotateFields, FieldData, Ids, PlaceholderGroup, SearchResultData};
use crate::error::Result;
use crate::schema::KeyValuePair;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub collection_name: String,
    #[serde(default)]
    pub expr: String,
    #[serde(default)]
    pub output_fields: Vec<String>,
    #[serde(default)]
    pub query_params: Vec<KeyValuePair>,
}

impl QueryRequest {
    pub fn new<S: Into<String>>(collection_name: S) -> Self {
        QueryRequest {
            collection_name: collection_name.into(),
            ..Default::default()
        }
    }

    pub fn with_expr<S: Into<String>>(mut self, expr: S) -> Self {
        self.expr = expr.into();
        self
    }

    pub fn with_output_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.output_fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn with_param<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.query_params.push(KeyValuePair::new(key, value.to_string()));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub collection_name: String,
    /// Filter expression.
    #[serde(default)]
    pub dsl: String,
    #[serde(default)]
    pub output_fields: Vec<String>,
    #[serde(default)]
    pub search_params: Vec<KeyValuePair>,
    /// Encoded [`PlaceholderGroup`].
    #[serde(default)]
    pub placeholder_group: Vec<u8>,
    pub nq: i64,
}

impl SearchRequest {
    /// Request over an encoded placeholder group; `nq` is taken from it.
    pub fn new<S: Into<String>>(collection_name: S, group: &PlaceholderGroup) -> Result<Self> {
        Ok(SearchRequest {
            collection_name: collection_name.into(),
            placeholder_group: group.to_bytes()?,
            nq: group.nq() as i64,
            ..Default::default()
        })
    }

    pub fn with_dsl<S: Into<String>>(mut self, dsl: S) -> Self {
        self.dsl = dsl.into();
        self
    }

    pub fn with_output_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.output_fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn with_param<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.search_params.push(KeyValuePair::new(key, value.to_string()));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub collection_name: String,
    pub expr: String,
}

impl DeleteRequest {
    pub fn new<C: Into<String>, E: Into<String>>(collection_name: C, expr: E) -> Self {
        DeleteRequest {
            collection_name: collection_name.into(),
            expr: expr.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HybridSearchRequest {
    pub collection_name: String,
    pub requests: Vec<SearchRequest>,
    #[serde(default)]
    pub rank_params: Vec<KeyValuePair>,
    #[serde(default)]
    pub output_fields: Vec<String>,
}

impl HybridSearchRequest {
    pub fn new<S: Into<String>>(collection_name: S, requests: Vec<SearchRequest>) -> Self {
        HybridSearchRequest {
            collection_name: collection_name.into(),
            requests,
            ..Default::default()
        }
    }

    pub fn with_output_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.output_fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    pub fn with_rank_param<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.rank_params.push(KeyValuePair::new(key, value.to_string()));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub collection_name: String,
    pub fields_data: Vec<FieldData>,
    pub output_fields: Vec<String>,
}

impl AnnotateFields for QueryResults {
    fn fields_data_mut(&mut self) -> &mut [FieldData] {
        &mut self.fields_data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub collection_name: String,
    pub results: SearchResultData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResults {
    /// Primary keys of the rows that matched the filter.
    pub ids: Ids,
    pub delete_cnt: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertResults {
    pub ids: Ids,
    pub insert_cnt: i64,
}
