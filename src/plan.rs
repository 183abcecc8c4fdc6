//! Engine-ready plans.
//!
//! A [`Plan`] is either a retrieve (query, delete, count) or a vector search,
//! plus the ids of the fields the engine must return. It crosses the engine
//! boundary as `bincode` bytes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VecnodeError};
use crate::expr::TypedExpr;
use crate::schema::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorType {
    BinaryVector,
    FloatVector,
    Float16Vector,
    BFloat16Vector,
    SparseFloatVector,
}

impl VectorType {
    pub fn from_data_type(dtype: DataType) -> Result<Self> {
        match dtype {
            DataType::BinaryVector => Ok(VectorType::BinaryVector),
            DataType::FloatVector => Ok(VectorType::FloatVector),
            DataType::Float16Vector => Ok(VectorType::Float16Vector),
            DataType::BFloat16Vector => Ok(VectorType::BFloat16Vector),
            DataType::SparseFloatVector => Ok(VectorType::SparseFloatVector),
            other => Err(VecnodeError::parameter_invalid(format!(
                "{other} is not a vector type"
            ))),
        }
    }
}

/// Ranking parameters of a vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    /// Rows fetched per query; the request's topk plus its offset.
    pub topk: i64,
    pub metric_type: String,
    /// Index-specific search params, passed through as raw JSON.
    pub search_params: String,
    pub round_decimal: i64,
    pub group_by_field_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorAnnsNode {
    pub vector_type: VectorType,
    pub field_id: i64,
    pub predicates: Option<TypedExpr>,
    pub query_info: QueryInfo,
    pub placeholder_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    pub predicates: Option<TypedExpr>,
    pub is_count: bool,
    /// Row cap (limit plus offset); -1 for counts and deletes.
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    VectorAnns(VectorAnnsNode),
    Query(QueryNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub node: PlanNode,
    pub output_field_ids: Vec<i64>,
}

impl Plan {
    pub fn query(predicates: Option<TypedExpr>, limit: i64, is_count: bool) -> Self {
        Plan {
            node: PlanNode::Query(QueryNode {
                predicates,
                is_count,
                limit,
            }),
            output_field_ids: Vec::new(),
        }
    }

    pub fn vector_anns(node: VectorAnnsNode) -> Self {
        Plan {
            node: PlanNode::VectorAnns(node),
            output_field_ids: Vec::new(),
        }
    }

    pub fn predicates(&self) -> Option<&TypedExpr> {
        match &self.node {
            PlanNode::VectorAnns(anns) => anns.predicates.as_ref(),
            PlanNode::Query(query) => query.predicates.as_ref(),
        }
    }

    /// Row limit of a query plan.
    pub fn limit(&self) -> Option<i64> {
        match &self.node {
            PlanNode::Query(query) => Some(query.limit),
            PlanNode::VectorAnns(_) => None,
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(&self.node, PlanNode::Query(query) if query.is_count)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| VecnodeError::internal(format!("malformed plan bytes: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::compile_filter;
    use crate::schema::{CollectionSchema, FieldSchema};

    #[test]
    fn test_plan_bytes_keep_predicate() {
        let schema = CollectionSchema::builder("c")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "tags", DataType::Array).with_element_type(DataType::VarChar))
            .build()
            .unwrap();
        let predicate =
            compile_filter(&schema, "id in [1, 2] and array_contains(tags, 'x')").unwrap();

        let mut plan = Plan::query(Some(predicate), 10, false);
        plan.output_field_ids = vec![100];

        let decoded = Plan::from_bytes(&plan.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, plan);
        assert!(!decoded.is_count());
        assert_eq!(decoded.limit(), Some(10));
        assert!(decoded.predicates().is_some());
    }

    #[test]
    fn test_vector_type_mapping() {
        assert_eq!(
            VectorType::from_data_type(DataType::SparseFloatVector).unwrap(),
            VectorType::SparseFloatVector
        );
        assert!(VectorType::from_data_type(DataType::Int64).is_err());
        assert!(Plan::from_bytes(&[1, 2, 3]).is_err());
    }
}
