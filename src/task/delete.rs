//! Delete-by-filter task.

use log::debug;

use crate::data::RetrieveResult;
use crate::error::{Result, VecnodeError};
use crate::expr::compile_filter;
use crate::plan::Plan;
use crate::schema::{CollectionSchema, SchemaResolver};
use crate::task::request::{DeleteRequest, DeleteResults};

/// Turns a delete filter into a plan that retrieves the matching primary keys.
#[derive(Debug)]
pub struct DeleteTask<'a> {
    schema: &'a CollectionSchema,
}

impl<'a> DeleteTask<'a> {
    pub fn new(schema: &'a CollectionSchema) -> Self {
        DeleteTask { schema }
    }

    pub fn process(&self, request: &DeleteRequest) -> Result<Plan> {
        let expr = request.expr.trim();
        if expr.is_empty() {
            return Err(VecnodeError::parameter_invalid("expr cannot be empty"));
        }
        let predicates = compile_filter(self.schema, expr)?;
        let pk = SchemaResolver::new(self.schema).primary_key()?;

        let mut plan = Plan::query(Some(predicates), -1, false);
        plan.output_field_ids = vec![pk.field_id];
        debug!("delete plan on {}: {expr}", self.schema.name);
        Ok(plan)
    }

    /// Ids of the matched rows.
    pub fn post_process(&self, result: &RetrieveResult) -> DeleteResults {
        DeleteResults {
            ids: result.ids.clone(),
            delete_cnt: result.ids.len() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Ids;
    use crate::schema::{DataType, FieldSchema};

    #[test]
    fn test_delete_plan() {
        let schema = CollectionSchema::builder("c")
            .field(FieldSchema::new(100, "pk", DataType::VarChar).primary_key())
            .field(FieldSchema::new(101, "n", DataType::Int64))
            .build()
            .unwrap();
        let task = DeleteTask::new(&schema);
        let plan = task.process(&DeleteRequest::new("c", " n > 3 ")).unwrap();
        assert_eq!(plan.output_field_ids, vec![100]);
        assert!(plan.predicates().is_some());

        let results = task.post_process(&RetrieveResult::new(
            Ids::Str(vec!["a".into(), "b".into()]),
            Vec::new(),
        ));
        assert_eq!(results.delete_cnt, 2);
    }

    #[test]
    fn test_delete_requires_filter_and_primary_key() {
        let schema = CollectionSchema::builder("c")
            .field(FieldSchema::new(101, "n", DataType::Int64))
            .build()
            .unwrap();
        let task = DeleteTask::new(&schema);

        let err = task.process(&DeleteRequest::new("c", "   ")).unwrap_err();
        assert!(err.to_string().contains("expr cannot be empty"));

        let err = task.process(&DeleteRequest::new("c", "n == 1")).unwrap_err();
        assert!(matches!(err, VecnodeError::CollectionIllegalSchema(_)));
    }
}
