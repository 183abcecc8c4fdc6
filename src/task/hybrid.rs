//! Multi-vector hybrid search task.
//!
//! A hybrid search runs in two rounds. The sub-searches go out without output
//! fields and without offset; their hits are rescored, fused and paginated
//! here. A second retrieve then fetches the requested fields for the fused
//! ids, and the fetched rows are put back into fused order.

use ahash::AHashMap;
use log::debug;

use crate::config::START_OF_USER_FIELD_ID;
use crate::data::{AnnotateFields, PrimaryKey, RetrieveResult, SearchResultData};
use crate::error::{Result, VecnodeError};
use crate::expr::compile_filter;
use crate::output_fields::{field_ids, translate_output_fields};
use crate::plan::Plan;
use crate::rank::{RankParams, RankStrategy, ReScorer, new_rescorers, rescore_and_fuse};
use crate::schema::{CollectionSchema, IndexMeta, SchemaResolver};
use crate::task::params::{ANNS_FIELD_KEY, METRIC_TYPE_KEY, OFFSET_KEY, without_key};
use crate::task::request::{HybridSearchRequest, QueryRequest, SearchRequest, SearchResults};
use crate::task::search::check_metric;

#[derive(Debug)]
pub struct HybridSearchTask<'a> {
    schema: &'a CollectionSchema,
    indexes: &'a [IndexMeta],
    nq: i64,
    rank: Option<RankParams>,
    scorers: Vec<Box<dyn ReScorer>>,
    output_fields: Vec<String>,
    user_output_fields: Vec<String>,
}

impl<'a> HybridSearchTask<'a> {
    pub fn new(schema: &'a CollectionSchema, indexes: &'a [IndexMeta]) -> Self {
        HybridSearchTask {
            schema,
            indexes,
            nq: 0,
            rank: None,
            scorers: Vec::new(),
            output_fields: Vec::new(),
            user_output_fields: Vec::new(),
        }
    }

    pub fn nq(&self) -> i64 {
        self.nq
    }

    pub fn scorers(&self) -> &[Box<dyn ReScorer>] {
        &self.scorers
    }

    fn rank(&self) -> Result<&RankParams> {
        self.rank
            .as_ref()
            .ok_or_else(|| VecnodeError::internal("hybrid search used before process_search"))
    }

    /// Validate `request` and derive the sub-search requests.
    pub fn process_search(&mut self, request: &HybridSearchRequest) -> Result<Vec<SearchRequest>> {
        let first = request
            .requests
            .first()
            .ok_or_else(|| VecnodeError::parameter_invalid("No subrequest found"))?;

        let fields = translate_output_fields(&request.output_fields, self.schema, false)?;
        self.output_fields = fields.result_fields;
        self.user_output_fields = fields.user_fields;

        self.rank = Some(RankParams::parse(&request.rank_params)?);
        let strategy = RankStrategy::parse(&request.rank_params, request.requests.len())?;
        self.scorers = new_rescorers(request.requests.len(), &strategy);
        self.nq = first.nq;

        let mut sub_requests = Vec::with_capacity(request.requests.len());
        for (req, scorer) in request.requests.iter().zip(self.scorers.iter_mut()) {
            if req.nq != self.nq {
                return Err(VecnodeError::parameter_invalid(format!(
                    "sub search request nq should be the same: invalid parameter[expected={}][actual={}]",
                    self.nq, req.nq
                )));
            }

            let sub = SearchRequest {
                collection_name: request.collection_name.clone(),
                dsl: req.dsl.clone(),
                output_fields: Vec::new(),
                search_params: without_key(&req.search_params, OFFSET_KEY),
                placeholder_group: req.placeholder_group.clone(),
                nq: req.nq,
            };

            let mut metric = "";
            let mut anns_field = "";
            for param in &sub.search_params {
                match param.key.as_str() {
                    METRIC_TYPE_KEY => metric = param.value.as_str(),
                    ANNS_FIELD_KEY => anns_field = param.value.as_str(),
                    _ => {}
                }
            }
            let field = SchemaResolver::new(self.schema).vector_field(anns_field)?;
            let metric = check_metric(self.indexes, field, metric)?;
            scorer.set_metric_type(&metric);
            debug!(
                "hybrid sub-search on {} with {} scorer, metric {metric}",
                field.name,
                scorer.name()
            );

            sub_requests.push(sub);
        }
        Ok(sub_requests)
    }

    /// Rescore and fuse the post-processed sub-search results.
    pub fn post_process_search(&self, results: Vec<SearchResultData>) -> Result<SearchResultData> {
        let nq = usize::try_from(self.nq).unwrap_or(0);
        rescore_and_fuse(results, &self.scorers, nq, self.rank()?)
    }

    /// Retrieve request fetching the requested fields of the fused ids.
    pub fn process_query(&self, request: &HybridSearchRequest, fused: &SearchResultData) -> Result<QueryRequest> {
        let pk = SchemaResolver::new(self.schema).primary_key()?;
        Ok(QueryRequest {
            collection_name: request.collection_name.clone(),
            expr: fused.ids.in_filter(&pk.name),
            output_fields: request.output_fields.clone(),
            query_params: Vec::new(),
        })
    }

    /// Retrieve plan for `query`. Its limit covers every fused id, which may
    /// exceed the limits a user query is held to.
    pub fn retrieve_plan(&self, query: &QueryRequest, fused: &SearchResultData) -> Result<Plan> {
        let predicates = compile_filter(self.schema, &query.expr)?;
        let mut plan = Plan::query(Some(predicates), fused.ids.len() as i64, false);

        let pk = SchemaResolver::new(self.schema).primary_key()?;
        plan.output_field_ids.push(pk.field_id);
        for field_id in field_ids(&self.output_fields, self.schema)? {
            if field_id >= START_OF_USER_FIELD_ID && !plan.output_field_ids.contains(&field_id) {
                plan.output_field_ids.push(field_id);
            }
        }
        debug!(
            "hybrid retrieve of {} fused ids, fields={:?}",
            fused.ids.len(),
            plan.output_field_ids
        );
        Ok(plan)
    }

    /// Attach the fetched columns to `fused`, in fused order.
    pub fn post_process(&self, fetched: &RetrieveResult, mut fused: SearchResultData) -> Result<SearchResults> {
        let positions: AHashMap<PrimaryKey, usize> = fetched
            .ids
            .iter()
            .enumerate()
            .map(|(position, id)| (id, position))
            .collect();

        let indexes = fused
            .ids
            .iter()
            .map(|id| {
                positions.get(&id).copied().ok_or_else(|| {
                    VecnodeError::internal(format!("id {id} of the fused result was not retrieved"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let wanted = field_ids(&self.output_fields, self.schema)?;
        fused.fields_data = fetched
            .fields_data
            .iter()
            .filter(|column| wanted.contains(&column.field_id))
            .map(|column| column.pick(&indexes))
            .collect::<Result<_>>()?;
        fused.output_fields = self.user_output_fields.clone();
        fused.fill_in_field_info(&self.output_fields, self.schema);

        Ok(SearchResults {
            collection_name: self.schema.name.clone(),
            results: fused,
        })
    }

    /// Result for a fusion that produced no ids, which needs no retrieve.
    pub fn finish_empty(&self, mut fused: SearchResultData) -> SearchResults {
        fused.output_fields = self.user_output_fields.clone();
        SearchResults {
            collection_name: self.schema.name.clone(),
            results: fused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FieldData, FieldValues, Ids, Placeholder, PlaceholderGroup};
    use crate::rank::params::{RANK_PARAMS_KEY, RANK_TYPE_KEY};
    use crate::schema::{DataType, FieldSchema};
    use crate::task::params::{LIMIT_KEY, TOPK_KEY};

    fn schema() -> CollectionSchema {
        CollectionSchema::builder("docs")
            .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
            .field(FieldSchema::new(101, "title", DataType::VarChar))
            .field(FieldSchema::new(102, "dense", DataType::FloatVector).with_dim(2))
            .field(FieldSchema::new(103, "other", DataType::FloatVector).with_dim(2))
            .build()
            .unwrap()
    }

    fn indexes() -> Vec<IndexMeta> {
        vec![IndexMeta::with_metric(102, "IP"), IndexMeta::with_metric(103, "L2")]
    }

    fn sub(field: &str, nq: usize) -> SearchRequest {
        let vectors = vec![vec![0.5, 0.5]; nq];
        SearchRequest::new("docs", &PlaceholderGroup::single(Placeholder::float_vectors("$0", &vectors)))
            .unwrap()
            .with_param(ANNS_FIELD_KEY, field)
            .with_param(TOPK_KEY, 5)
            .with_param(OFFSET_KEY, 3)
    }

    #[test]
    fn test_process_search() {
        let schema = schema();
        let indexes = indexes();
        let mut task = HybridSearchTask::new(&schema, &indexes);
        let request = HybridSearchRequest::new("docs", vec![sub("dense", 1), sub("other", 1)])
            .with_output_fields(&["title"])
            .with_rank_param(LIMIT_KEY, 3)
            .with_rank_param(RANK_TYPE_KEY, "weighted")
            .with_rank_param(RANK_PARAMS_KEY, r#"{"weights": [0.7, 0.3]}"#);

        let subs = task.process_search(&request).unwrap();
        assert_eq!(subs.len(), 2);
        assert!(subs.iter().all(|s| s.search_params.iter().all(|kv| kv.key != OFFSET_KEY)));
        assert!(subs.iter().all(|s| s.output_fields.is_empty()));
        assert_eq!(task.scorers()[0].metric_type(), "IP");
        assert_eq!(task.scorers()[1].metric_type(), "L2");
    }

    #[test]
    fn test_nq_mismatch_and_empty_request() {
        let schema = schema();
        let indexes = indexes();
        let request = HybridSearchRequest::new("docs", vec![sub("dense", 2), sub("other", 3)])
            .with_rank_param(LIMIT_KEY, 3);
        let err = HybridSearchTask::new(&schema, &indexes)
            .process_search(&request)
            .unwrap_err();
        assert!(err.to_string().contains("[expected=2][actual=3]"));

        let request = HybridSearchRequest::new("docs", Vec::new()).with_rank_param(LIMIT_KEY, 3);
        let err = HybridSearchTask::new(&schema, &indexes)
            .process_search(&request)
            .unwrap_err();
        assert!(err.to_string().contains("No subrequest found"));
    }

    #[test]
    fn test_metric_checked_per_sub_request() {
        let schema = schema();
        let indexes = indexes();
        let request = HybridSearchRequest::new(
            "docs",
            vec![sub("dense", 1), sub("other", 1).with_param(METRIC_TYPE_KEY, "COSINE")],
        )
        .with_rank_param(LIMIT_KEY, 3);
        let err = HybridSearchTask::new(&schema, &indexes)
            .process_search(&request)
            .unwrap_err();
        assert!(err.to_string().contains("[expected=L2][actual=COSINE]"));
    }

    #[test]
    fn test_reorders_fetched_rows() {
        let schema = schema();
        let indexes = indexes();
        let mut task = HybridSearchTask::new(&schema, &indexes);
        let request = HybridSearchRequest::new("docs", vec![sub("dense", 1)])
            .with_output_fields(&["title"])
            .with_rank_param(LIMIT_KEY, 3);
        task.process_search(&request).unwrap();

        let fused = SearchResultData {
            num_queries: 1,
            top_k: 3,
            topks: vec![3],
            scores: vec![0.3, 0.2, 0.1],
            ids: Ids::Int(vec![5, 3, 9]),
            ..Default::default()
        };
        let query = task.process_query(&request, &fused).unwrap();
        assert_eq!(query.expr, "id in [5,3,9]");
        let plan = task.retrieve_plan(&query, &fused).unwrap();
        assert_eq!(plan.limit(), Some(3));
        assert_eq!(plan.output_field_ids, vec![100, 101]);

        let fetched = RetrieveResult::new(
            Ids::Int(vec![3, 9, 5]),
            vec![
                FieldData::new(100, "", DataType::None, FieldValues::Long(vec![3, 9, 5])),
                FieldData::new(
                    101,
                    "",
                    DataType::None,
                    FieldValues::String(vec!["c".into(), "i".into(), "e".into()]),
                ),
            ],
        );
        let results = task.post_process(&fetched, fused.clone()).unwrap().results;
        assert_eq!(results.fields_data.len(), 1);
        assert_eq!(results.fields_data[0].field_name, "title");
        assert_eq!(
            results.fields_data[0].values,
            FieldValues::String(vec!["e".into(), "c".into(), "i".into()])
        );
        assert_eq!(results.output_fields, vec!["title"]);

        let partial = RetrieveResult::new(Ids::Int(vec![3]), Vec::new());
        let err = task.post_process(&partial, fused).unwrap_err();
        assert!(matches!(err, VecnodeError::ServiceInternal(_)));
    }
}
