//! Scalar query (and count) task.

use log::debug;

use crate::config::{COUNT_STR, START_OF_USER_FIELD_ID, TOPK_LIMIT};
use crate::data::{AnnotateFields, FieldData, RetrieveResult};
use crate::error::{Result, VecnodeError};
use crate::expr::compile_filter;
use crate::output_fields::translate_output_fields;
use crate::plan::Plan;
use crate::schema::CollectionSchema;
use crate::task::params::{LIMIT_KEY, OFFSET_KEY, parse_param};
use crate::task::request::{QueryRequest, QueryResults};

/// Whether `output_fields` is exactly the `count(*)` sentinel.
pub fn is_count_request<S: AsRef<str>>(output_fields: &[S]) -> bool {
    output_fields.len() == 1 && output_fields[0].as_ref().trim().to_lowercase() == COUNT_STR
}

#[derive(Debug)]
pub struct QueryTask<'a> {
    schema: &'a CollectionSchema,
    limit: i64,
    offset: i64,
    is_count: bool,
    output_fields: Vec<String>,
    user_output_fields: Vec<String>,
}

impl<'a> QueryTask<'a> {
    pub fn new(schema: &'a CollectionSchema) -> Self {
        QueryTask {
            schema,
            limit: -1,
            offset: 0,
            is_count: false,
            output_fields: Vec::new(),
            user_output_fields: Vec::new(),
        }
    }

    pub fn is_count(&self) -> bool {
        self.is_count
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Validate `request` and build its retrieve plan.
    pub fn process(&mut self, request: &QueryRequest) -> Result<Plan> {
        self.is_count = is_count_request(&request.output_fields);
        let expr = request.expr.trim();

        self.parse_query_params(request, expr.is_empty())?;

        let predicates = if expr.is_empty() {
            None
        } else {
            Some(compile_filter(self.schema, expr)?)
        };
        let mut plan = Plan::query(predicates, self.limit + self.offset, self.is_count);

        if self.is_count {
            self.user_output_fields = vec![COUNT_STR.to_string()];
        } else if request.output_fields.is_empty() {
            let scalars: Vec<_> = self
                .schema
                .user_fields()
                .filter(|f| !f.is_vector())
                .collect();
            self.output_fields = scalars.iter().map(|f| f.name.clone()).collect();
            self.user_output_fields = self.output_fields.clone();
            plan.output_field_ids = scalars.iter().map(|f| f.field_id).collect();
        } else {
            let fields = translate_output_fields(&request.output_fields, self.schema, true)
                .map_err(|e| {
                    VecnodeError::parameter_invalid(format!("Error output fields: {e}"))
                })?;
            self.output_fields = fields.result_fields;
            self.user_output_fields = fields.user_fields;
            plan.output_field_ids = self.output_field_ids()?;
        }

        debug!(
            "query plan on {}: limit={} offset={} count={} fields={:?}",
            self.schema.name, self.limit, self.offset, self.is_count, plan.output_field_ids
        );
        Ok(plan)
    }

    fn parse_query_params(&mut self, request: &QueryRequest, expr_empty: bool) -> Result<()> {
        for param in &request.query_params {
            match param.key.as_str() {
                LIMIT_KEY => self.limit = parse_param(LIMIT_KEY, &param.value)?,
                OFFSET_KEY => self.offset = parse_param(OFFSET_KEY, &param.value)?,
                _ => {}
            }
        }

        if self.offset < 0 || self.offset >= TOPK_LIMIT {
            return Err(VecnodeError::parameter_invalid(format!(
                "Offset should be in range [0, {TOPK_LIMIT}], but got {}",
                self.offset
            )));
        }

        if self.limit <= 0 {
            if self.is_count {
                self.limit = -1;
            } else if expr_empty {
                return Err(VecnodeError::parameter_invalid(
                    "empty expression should be used with limit",
                ));
            } else {
                self.limit = TOPK_LIMIT - self.offset - 1;
            }
        }

        if self.limit >= TOPK_LIMIT {
            return Err(VecnodeError::parameter_invalid(format!(
                "limit should be in range [1, {TOPK_LIMIT}], but got {}",
                self.limit
            )));
        }
        if self.limit + self.offset >= TOPK_LIMIT {
            return Err(VecnodeError::parameter_invalid(format!(
                "topk + offset should be in range [1, {TOPK_LIMIT}], but got {}",
                self.limit + self.offset
            )));
        }
        Ok(())
    }

    /// Primary key first, then every other requested user field.
    fn output_field_ids(&self) -> Result<Vec<i64>> {
        let pk = self.schema.primary_key();
        let mut ids: Vec<i64> = pk.iter().map(|f| f.field_id).collect();
        for name in &self.output_fields {
            if pk.is_some_and(|pk| &pk.name == name) {
                continue;
            }
            let field = self.schema.field(name).ok_or_else(|| {
                VecnodeError::parameter_invalid(format!(
                    "Error output fields: {name} not found in schema"
                ))
            })?;
            if field.field_id >= START_OF_USER_FIELD_ID {
                ids.push(field.field_id);
            }
        }
        Ok(ids)
    }

    /// Deduplicate engine rows by primary key and apply offset and limit.
    pub fn post_process(&self, result: RetrieveResult) -> Result<QueryResults> {
        let mut results = QueryResults {
            collection_name: self.schema.name.clone(),
            ..Default::default()
        };

        if self.is_count {
            let mut count = result.fields_data.into_iter().next().ok_or_else(|| {
                VecnodeError::internal("count result carries no field data")
            })?;
            count.field_name = COUNT_STR.to_string();
            results.fields_data.push(count);
            results.output_fields.push(COUNT_STR.to_string());
            return Ok(results);
        }

        let unique = result.ids.dedup_indexes();
        let size = unique.len() as i64;
        if size > self.offset {
            let len = self.limit.min(size - self.offset) as usize;
            let range = [(self.offset as usize, len)];
            for column in &result.fields_data {
                results.fields_data.push(column.pick(&unique)?.slice(&range)?);
            }
        } else {
            for name in &self.output_fields {
                if let Some(field) = self.schema.field(name) {
                    results.fields_data.push(FieldData::empty_for(field, self.schema)?);
                }
            }
        }

        results.fill_in_field_info(&self.output_fields, self.schema);
        results.output_fields = self.user_output_fields.clone();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FieldValues, Ids};
    use crate::plan::PlanNode;
    use crate::schema::{DataType, FieldSchema};

    fn schema() -> CollectionSchema {
        CollectionSchema::builder("books")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "title", DataType::VarChar))
            .field(FieldSchema::new(102, "embedding", DataType::FloatVector).with_dim(2))
            .build()
            .unwrap()
    }

    fn rows(ids: Vec<i64>) -> RetrieveResult {
        let titles = ids.iter().map(|id| format!("t{id}")).collect();
        RetrieveResult::new(
            Ids::Int(ids.clone()),
            vec![
                FieldData::new(100, "", DataType::None, FieldValues::Long(ids)),
                FieldData::new(101, "", DataType::None, FieldValues::String(titles)),
            ],
        )
    }

    #[test]
    fn test_count_detection() {
        assert!(is_count_request(&[" COUNT(*) "]));
        assert!(!is_count_request(&["count(*)", "id"]));

        let schema = schema();
        let mut task = QueryTask::new(&schema);
        let request = QueryRequest::new("books").with_output_fields(&["count(*)"]);
        let plan = task.process(&request).unwrap();
        assert!(plan.is_count());
        assert!(plan.output_field_ids.is_empty());

        let count = FieldData::new(0, "", DataType::Int64, FieldValues::Long(vec![7]));
        let results = task.post_process(RetrieveResult::new(Ids::default(), vec![count])).unwrap();
        assert_eq!(results.output_fields, vec!["count(*)"]);
        assert_eq!(results.fields_data[0].field_name, "count(*)");
    }

    #[test]
    fn test_limit_defaults_and_bounds() {
        let schema = schema();

        let mut task = QueryTask::new(&schema);
        let plan = task
            .process(&QueryRequest::new("books").with_expr("id > 1").with_param(OFFSET_KEY, 4))
            .unwrap();
        assert_eq!(task.limit(), TOPK_LIMIT - 5);
        assert!(matches!(plan.node, PlanNode::Query(ref q) if q.limit == TOPK_LIMIT - 1));

        let err = QueryTask::new(&schema)
            .process(&QueryRequest::new("books"))
            .unwrap_err();
        assert!(err.to_string().contains("empty expression should be used with limit"));

        let err = QueryTask::new(&schema)
            .process(&QueryRequest::new("books").with_expr("id > 1").with_param(OFFSET_KEY, -1))
            .unwrap_err();
        assert!(err.to_string().contains("Offset should be in range"));

        let err = QueryTask::new(&schema)
            .process(
                &QueryRequest::new("books")
                    .with_param(LIMIT_KEY, 16000)
                    .with_param(OFFSET_KEY, 384),
            )
            .unwrap_err();
        assert!(err.to_string().contains("topk + offset should be in range [1, 16384], but got 16384"));

        let err = QueryTask::new(&schema)
            .process(&QueryRequest::new("books").with_param(LIMIT_KEY, "x"))
            .unwrap_err();
        assert!(err.to_string().contains("Parse limit failed, limit: x"));
    }

    #[test]
    fn test_output_field_ids() {
        let schema = schema();

        let mut task = QueryTask::new(&schema);
        let plan = task
            .process(&QueryRequest::new("books").with_expr("id > 0").with_output_fields(&["title"]))
            .unwrap();
        assert_eq!(plan.output_field_ids, vec![100, 101]);

        let mut task = QueryTask::new(&schema);
        let plan = task
            .process(&QueryRequest::new("books").with_expr("id > 0").with_output_fields(&["*"]))
            .unwrap();
        assert_eq!(plan.output_field_ids, vec![100, 102, 101]);

        let mut task = QueryTask::new(&schema);
        let plan = task
            .process(&QueryRequest::new("books").with_expr("id > 0"))
            .unwrap();
        assert_eq!(plan.output_field_ids, vec![100, 101]);
        let results = task.post_process(rows(vec![3, 4])).unwrap();
        assert_eq!(results.output_fields, vec!["id", "title"]);
        assert_eq!(results.fields_data[1].field_name, "title");

        let err = QueryTask::new(&schema)
            .process(&QueryRequest::new("books").with_expr("id > 0").with_output_fields(&["nope"]))
            .unwrap_err();
        assert!(err.to_string().contains("Error output fields"));
    }

    #[test]
    fn test_dedup_and_paginate() {
        let schema = schema();
        let mut task = QueryTask::new(&schema);
        task.process(
            &QueryRequest::new("books")
                .with_expr("id in [1, 2, 3]")
                .with_output_fields(&["title"])
                .with_param(LIMIT_KEY, 2)
                .with_param(OFFSET_KEY, 1),
        )
        .unwrap();

        let results = task.post_process(rows(vec![3, 1, 3, 2])).unwrap();
        assert_eq!(results.output_fields, vec!["id", "title"]);
        assert_eq!(results.fields_data[0].field_name, "id");
        assert_eq!(results.fields_data[0].values, FieldValues::Long(vec![1, 2]));
        assert_eq!(
            results.fields_data[1].values,
            FieldValues::String(vec!["t1".into(), "t2".into()])
        );
    }

    #[test]
    fn test_offset_past_end_returns_empty_columns() {
        let schema = schema();
        let mut task = QueryTask::new(&schema);
        task.process(
            &QueryRequest::new("books")
                .with_expr("id in [1, 2, 3]")
                .with_output_fields(&["title"])
                .with_param(LIMIT_KEY, 2)
                .with_param(OFFSET_KEY, 5),
        )
        .unwrap();

        let results = task.post_process(rows(vec![1, 2, 3])).unwrap();
        assert_eq!(results.fields_data.len(), 2);
        assert!(results.fields_data.iter().all(FieldData::is_empty));
        assert_eq!(results.fields_data[1].data_type, DataType::VarChar);
    }
}
