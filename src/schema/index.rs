//! Per-field index descriptors.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecnodeError};
use crate::schema::field::{KeyValuePair, METRIC_TYPE_KEY, find_param};

/// Index metadata attached to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub field_id: i64,
    #[serde(default)]
    pub index_name: String,
    #[serde(default)]
    pub type_params: Vec<KeyValuePair>,
    #[serde(default)]
    pub index_params: Vec<KeyValuePair>,
    #[serde(default)]
    pub user_index_params: Vec<KeyValuePair>,
}

impl IndexMeta {
    pub fn new<S: Into<String>>(field_id: i64, index_name: S) -> Self {
        IndexMeta {
            field_id,
            index_name: index_name.into(),
            type_params: Vec::new(),
            index_params: Vec::new(),
            user_index_params: Vec::new(),
        }
    }

    /// Shorthand for an index carrying only a metric type.
    pub fn with_metric<S: Into<String>>(field_id: i64, metric: S) -> Self {
        let mut meta = IndexMeta::new(field_id, format!("idx_{field_id}"));
        meta.index_params
            .push(KeyValuePair::new(METRIC_TYPE_KEY, metric));
        meta
    }

    /// Metric type, looked up in type params, then index params, then user
    /// index params. Empty when none of them carries one.
    pub fn metric_type(&self) -> &str {
        [
            &self.type_params,
            &self.index_params,
            &self.user_index_params,
        ]
        .into_iter()
        .find_map(|params| find_param(params, METRIC_TYPE_KEY))
        .unwrap_or("")
    }

    /// Decode one serialized descriptor.
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| VecnodeError::internal(format!("Error index info in db: {e}")))
    }

    /// Decode every serialized descriptor, failing on the first bad one.
    pub fn decode_all<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Self>> {
        raw.iter().map(|r| IndexMeta::decode(r.as_ref())).collect()
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Metric of the index built on `field_id`, or `IndexNotFound`.
pub fn index_metric_for<'a>(indexes: &'a [IndexMeta], field_id: i64, field_name: &str) -> Result<&'a str> {
    let metric = indexes
        .iter()
        .filter(|index| index.field_id == field_id)
        .map(IndexMeta::metric_type)
        .last()
        .unwrap_or("");
    if metric.is_empty() {
        return Err(VecnodeError::index_not_found(format!(
            "No index found in field [{field_name}]"
        )));
    }
    Ok(metric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_priority() {
        let mut meta = IndexMeta::new(101, "idx");
        meta.user_index_params
            .push(KeyValuePair::new(METRIC_TYPE_KEY, "L2"));
        assert_eq!(meta.metric_type(), "L2");

        meta.index_params
            .push(KeyValuePair::new(METRIC_TYPE_KEY, "COSINE"));
        assert_eq!(meta.metric_type(), "COSINE");

        meta.type_params
            .push(KeyValuePair::new(METRIC_TYPE_KEY, "IP"));
        assert_eq!(meta.metric_type(), "IP");
    }

    #[test]
    fn test_index_metric_lookup() {
        let indexes = vec![IndexMeta::with_metric(101, "IP")];
        assert_eq!(index_metric_for(&indexes, 101, "vec").unwrap(), "IP");

        let err = index_metric_for(&indexes, 102, "other").unwrap_err();
        assert!(matches!(err, VecnodeError::IndexNotFound(_)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = IndexMeta::decode("not json").unwrap_err();
        assert!(matches!(err, VecnodeError::ServiceInternal(_)));

        let raw = IndexMeta::with_metric(7, "BM25").encode().unwrap();
        assert_eq!(IndexMeta::decode_all(&[raw]).unwrap()[0].metric_type(), "BM25");
    }
}
