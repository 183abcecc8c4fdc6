//! Vector search task.

use log::debug;

use crate::config::{PLACEHOLDER_TAG, ROW_ID_FIELD_ID, TOPK_LIMIT};
use crate::data::{AnnotateFields, SearchResultData};
use crate::error::{Result, VecnodeError};
use crate::expr::compile_filter;
use crate::output_fields::{field_ids, translate_output_fields};
use crate::plan::{Plan, QueryInfo, VectorAnnsNode, VectorType};
use crate::schema::{CollectionSchema, FieldSchema, IndexMeta, SchemaResolver, index_metric_for};
use crate::task::params::{
    ANNS_FIELD_KEY, GROUP_BY_FIELD_KEY, METRIC_TYPE_KEY, OFFSET_KEY, ROUND_DECIMAL_KEY,
    SEARCH_PARAMS_KEY, TOPK_KEY, parse_param,
};
use crate::task::request::{SearchRequest, SearchResults};

/// Whether larger scores of `metric` mean closer matches.
pub fn positively_related(metric: &str) -> bool {
    matches!(metric.to_uppercase().as_str(), "IP" | "COSINE")
}

/// Metric of the index on `field`, checked against the requested one.
///
/// An empty request metric takes the index metric.
pub fn check_metric(indexes: &[IndexMeta], field: &FieldSchema, requested: &str) -> Result<String> {
    let index_metric = index_metric_for(indexes, field.field_id, &field.name)?;
    let metric = if requested.is_empty() {
        index_metric
    } else {
        requested
    };
    if metric != index_metric {
        return Err(VecnodeError::parameter_invalid(format!(
            "fail to search: metric type not match: invalid [expected={index_metric}][actual={metric}]"
        )));
    }
    Ok(metric.to_string())
}

#[derive(Debug)]
pub struct SearchTask<'a> {
    schema: &'a CollectionSchema,
    indexes: &'a [IndexMeta],
    topk: i64,
    offset: i64,
    metric: String,
    anns_field: String,
    output_fields: Vec<String>,
    user_output_fields: Vec<String>,
}

impl<'a> SearchTask<'a> {
    pub fn new(schema: &'a CollectionSchema, indexes: &'a [IndexMeta]) -> Self {
        SearchTask {
            schema,
            indexes,
            topk: -1,
            offset: 0,
            metric: String::new(),
            anns_field: String::new(),
            output_fields: Vec::new(),
            user_output_fields: Vec::new(),
        }
    }

    /// Metric the search runs with, known after [`process`](Self::process).
    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn topk(&self) -> i64 {
        self.topk
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Validate `request` and build its vector search plan.
    pub fn process(&mut self, request: &SearchRequest) -> Result<Plan> {
        let fields = translate_output_fields(&request.output_fields, self.schema, false)?;
        self.output_fields = fields.result_fields;
        self.user_output_fields = fields.user_fields;

        let query_info = self.parse_search_info(request)?;

        let field = SchemaResolver::new(self.schema).vector_field(&self.anns_field)?;
        let vector_type = VectorType::from_data_type(field.data_type)?;
        self.metric = check_metric(self.indexes, field, &self.metric)?;

        let predicates = if request.dsl.is_empty() {
            None
        } else {
            Some(compile_filter(self.schema, &request.dsl)?)
        };

        let mut plan = Plan::vector_anns(VectorAnnsNode {
            vector_type,
            field_id: field.field_id,
            predicates,
            query_info: QueryInfo {
                metric_type: self.metric.clone(),
                ..query_info
            },
            placeholder_tag: PLACEHOLDER_TAG.to_string(),
        });
        plan.output_field_ids = field_ids(&self.output_fields, self.schema)?;

        debug!(
            "search plan on {}.{}: topk={} offset={} metric={}",
            self.schema.name, field.name, self.topk, self.offset, self.metric
        );
        Ok(plan)
    }

    fn parse_search_info(&mut self, request: &SearchRequest) -> Result<QueryInfo> {
        let mut round_decimal = -1;
        let mut search_params = String::new();
        let mut group_by_field = String::new();

        for param in &request.search_params {
            let value = param.value.as_str();
            match param.key.as_str() {
                TOPK_KEY => self.topk = parse_param(TOPK_KEY, value)?,
                OFFSET_KEY => self.offset = parse_param(OFFSET_KEY, value)?,
                METRIC_TYPE_KEY => self.metric = value.to_string(),
                ROUND_DECIMAL_KEY => round_decimal = parse_param(ROUND_DECIMAL_KEY, value)?,
                SEARCH_PARAMS_KEY => search_params = value.to_string(),
                GROUP_BY_FIELD_KEY => group_by_field = value.to_string(),
                ANNS_FIELD_KEY => self.anns_field = value.to_string(),
                _ => {}
            }
        }

        if self.topk <= 0 || self.topk > TOPK_LIMIT {
            return Err(VecnodeError::parameter_invalid(format!(
                "Topk should be in range [1, {TOPK_LIMIT}], but got {}",
                self.topk
            )));
        }
        if self.offset < 0 || self.offset > TOPK_LIMIT {
            return Err(VecnodeError::parameter_invalid(format!(
                "Offset should be in range [0, {TOPK_LIMIT}], but got {}",
                self.offset
            )));
        }
        if self.topk + self.offset > TOPK_LIMIT {
            return Err(VecnodeError::parameter_invalid(format!(
                "topk + offset should be in range [1, {TOPK_LIMIT}], but got {}",
                self.topk + self.offset
            )));
        }
        if round_decimal != -1 && !(0..=6).contains(&round_decimal) {
            return Err(VecnodeError::parameter_invalid(format!(
                "round_decimal {round_decimal} is invalid, should be -1 or an integer in range [0, 6]"
            )));
        }

        let group_by_field_id = if group_by_field.is_empty() {
            ROW_ID_FIELD_ID
        } else {
            self.schema
                .field(&group_by_field)
                .map(|f| f.field_id)
                .ok_or_else(|| {
                    VecnodeError::parameter_invalid(format!(
                        "groupBy field {group_by_field} not found in schema"
                    ))
                })?
        };

        Ok(QueryInfo {
            topk: self.topk + self.offset,
            metric_type: String::new(),
            search_params,
            round_decimal,
            group_by_field_id,
        })
    }

    /// Drop the first `offset` hits of every query and orient scores so that
    /// larger is better.
    pub fn post_process(&self, result: SearchResultData) -> Result<SearchResults> {
        let nq = result.num_queries;
        let mut data = SearchResultData {
            num_queries: nq,
            ids: result.ids.pick(&[])?,
            ..Default::default()
        };

        let coefficient = if positively_related(&self.metric) { 1.0 } else { -1.0 };
        let offset = self.offset as usize;

        if nq * self.offset < result.scores.len() as i64 {
            let mut ranges = Vec::with_capacity(result.topks.len());
            let mut indexes = Vec::new();
            for (start, len) in result.query_ranges() {
                let limit = len.saturating_sub(offset);
                data.top_k = data.top_k.max(limit as i64);
                data.topks.push(limit as i64);
                ranges.push((start + offset, limit));
                indexes.extend(start + offset..start + len);
            }

            for &i in &indexes {
                let score = result.scores.get(i).ok_or_else(|| {
                    VecnodeError::internal(format!("score index {i} out of range"))
                })?;
                data.scores.push(score * coefficient);
            }
            data.ids = result.ids.pick(&indexes)?;
            data.fields_data = result
                .fields_data
                .iter()
                .map(|column| column.slice(&ranges))
                .collect::<Result<_>>()?;
            data.fill_in_field_info(&self.output_fields, self.schema);
            data.output_fields = self.user_output_fields.clone();
        } else {
            data.topks = vec![0; usize::try_from(nq).unwrap_or(0)];
        }

        Ok(SearchResults {
            collection_name: self.schema.name.clone(),
            results: data,
        })
    }
}
