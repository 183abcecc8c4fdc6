//! Raw engine results.

use serde::{Deserialize, Serialize};

use crate::data::{AnnotateFields, FieldData, Ids};

/// Rows returned by a retrieve plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieveResult {
    pub ids: Ids,
    pub fields_data: Vec<FieldData>,
}

impl RetrieveResult {
    pub fn new(ids: Ids, fields_data: Vec<FieldData>) -> Self {
        RetrieveResult { ids, fields_data }
    }
}

impl AnnotateFields for RetrieveResult {
    fn fields_data_mut(&mut self) -> &mut [FieldData] {
        &mut self.fields_data
    }
}

/// Ranked hits of a batch of `num_queries` queries.
///
/// Hits are laid out query after query; query `i` owns `topks[i]`
/// consecutive entries of `ids`, `scores` and every column of `fields_data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResultData {
    pub num_queries: i64,
    pub top_k: i64,
    pub topks: Vec<i64>,
    pub scores: Vec<f32>,
    pub ids: Ids,
    #[serde(default)]
    pub fields_data: Vec<FieldData>,
    #[serde(default)]
    pub output_fields: Vec<String>,
}

impl SearchResultData {
    /// Result with no hits for `num_queries` queries.
    pub fn empty(num_queries: i64, ids: Ids) -> Self {
        SearchResultData {
            num_queries,
            topks: vec![0; usize::try_from(num_queries).unwrap_or(0)],
            ids,
            ..Default::default()
        }
    }

    /// `(start, len)` of every query's hits.
    pub fn query_ranges(&self) -> Vec<(usize, usize)> {
        let mut start = 0;
        self.topks
            .iter()
            .map(|&topk| {
                let len = usize::try_from(topk).unwrap_or(0);
                let range = (start, len);
                start += len;
                range
            })
            .collect()
    }
}

impl AnnotateFields for SearchResultData {
    fn fields_data_mut(&mut self) -> &mut [FieldData] {
        &mut self.fields_data
    }
}
