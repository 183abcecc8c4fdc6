//! Request orchestration.
//!
//! A [`Node`] fetches a schema snapshot per request, runs the matching task
//! and talks to the engine in between. Inserts and deletes on collections
//! with BM25 functions also maintain the corpus statistics; a statistics
//! update and its row mutation commit or roll back together.

use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::config::NodeConfig;
use crate::data::{FieldData, FieldValues, PlaceholderGroup, PlaceholderType, RetrieveResult};
use crate::engine::{ExecutionEngine, RowWriter, SchemaStore};
use crate::error::{Result, VecnodeError};
use crate::function::{FunctionExecutor, decode_sparse, encode_sparse};
use crate::plan::{Plan, PlanNode};
use crate::schema::{CollectionSchema, IndexMeta};
use crate::stats::{Bm25Stats, StatsStore, with_transaction};
use crate::task::{
    DeleteRequest, DeleteResults, DeleteTask, HybridSearchRequest, HybridSearchTask,
    InsertResults, QueryRequest, QueryResults, QueryTask, SearchRequest, SearchResults,
    SearchTask,
};

fn rejected<T>(operation: &str, collection: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!("{operation} on {collection} rejected: {e}");
    }
    result
}

fn engine_call<T>(operation: &str, collection: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!("engine {operation} on {collection} failed: {e}");
    }
    result
}

/// Encoded sparse rows of a column, or an internal error for any other type.
fn sparse_rows(column: &FieldData) -> Result<&[Vec<u8>]> {
    match &column.values {
        FieldValues::SparseFloatVector { contents, .. } => Ok(contents),
        _ => Err(VecnodeError::internal(format!(
            "column {} is not a sparse vector",
            column.field_name
        ))),
    }
}

#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    schemas: Arc<dyn SchemaStore>,
    engine: Arc<dyn ExecutionEngine>,
    writer: Arc<dyn RowWriter>,
    stats: Arc<dyn StatsStore>,
    executors: RwLock<AHashMap<String, Arc<FunctionExecutor>>>,
    /// Serializes statistics transactions.
    write_lock: Mutex<()>,
}

impl Node {
    pub fn new(
        schemas: Arc<dyn SchemaStore>,
        engine: Arc<dyn ExecutionEngine>,
        writer: Arc<dyn RowWriter>,
        stats: Arc<dyn StatsStore>,
    ) -> Self {
        Node {
            config: NodeConfig::default(),
            schemas,
            engine,
            writer,
            stats,
            executors: RwLock::new(AHashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<dyn StatsStore> {
        &self.stats
    }

    /// Function executor of `schema`, built once per collection.
    fn executor(&self, schema: &CollectionSchema) -> Result<Arc<FunctionExecutor>> {
        if let Some(executor) = self.executors.read().get(&schema.name) {
            return Ok(Arc::clone(executor));
        }
        let executor = Arc::new(FunctionExecutor::with_config(schema, &self.config)?);
        self.executors
            .write()
            .insert(schema.name.clone(), Arc::clone(&executor));
        Ok(executor)
    }

    pub fn query(&self, request: &QueryRequest) -> Result<QueryResults> {
        let collection = request.collection_name.as_str();
        let schema = self.schemas.get_schema(collection)?;
        let mut task = QueryTask::new(&schema);
        let plan = rejected("query", collection, task.process(request))?;
        let raw = engine_call(
            "retrieve",
            collection,
            self.engine.retrieve(collection, &plan.to_bytes()?),
        )?;
        task.post_process(raw)
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let collection = request.collection_name.as_str();
        let schema = self.schemas.get_schema(collection)?;
        let indexes = self.schemas.get_indexes(collection)?;
        self.run_search(&schema, &indexes, request)
    }

    fn run_search(
        &self,
        schema: &CollectionSchema,
        indexes: &[IndexMeta],
        request: &SearchRequest,
    ) -> Result<SearchResults> {
        let collection = schema.name.as_str();
        let mut task = SearchTask::new(schema, indexes);
        let plan = rejected("search", collection, task.process(request))?;
        let placeholder_group =
            self.prepare_placeholders(schema, &plan, &request.placeholder_group)?;

        let raw = engine_call(
            "search",
            collection,
            self.engine.search(collection, &plan.to_bytes()?, &placeholder_group),
        )?;
        task.post_process(raw)
    }

    /// Turn text queries on a BM25 output field into IDF-weighted sparse
    /// vectors. Other placeholder groups pass through unchanged.
    fn prepare_placeholders(
        &self,
        schema: &CollectionSchema,
        plan: &Plan,
        raw: &[u8],
    ) -> Result<Vec<u8>> {
        let group = PlaceholderGroup::from_bytes(raw)?;
        let is_text = group
            .placeholders
            .first()
            .is_some_and(|p| p.placeholder_type == PlaceholderType::VarChar);
        if !is_text {
            return Ok(raw.to_vec());
        }

        let PlanNode::VectorAnns(anns) = &plan.node else {
            return Err(VecnodeError::internal("search plan has no vector node"));
        };
        let field = schema.field_by_id(anns.field_id).ok_or_else(|| {
            VecnodeError::internal(format!("field id {} not in schema", anns.field_id))
        })?;

        let mut embedded = self
            .executor(schema)?
            .process_search_for(&field.name, &group)?;
        let stats = self.stats.stats(&schema.name, &field.name)?;
        for placeholder in &mut embedded.placeholders {
            for value in &mut placeholder.values {
                let weighted = stats.apply_idf(&decode_sparse(value)?);
                *value = encode_sparse(&weighted);
            }
        }
        debug!(
            "embedded {} text queries for {}.{} over {} docs",
            embedded.nq(),
            schema.name,
            field.name,
            stats.doc_num
        );
        embedded.to_bytes()
    }

    pub fn hybrid_search(&self, request: &HybridSearchRequest) -> Result<SearchResults> {
        let collection = request.collection_name.as_str();
        let schema = self.schemas.get_schema(collection)?;
        let indexes = self.schemas.get_indexes(collection)?;

        let mut task = HybridSearchTask::new(&schema, &indexes);
        let sub_requests = rejected("hybrid search", collection, task.process_search(request))?;

        let mut sub_results = Vec::with_capacity(sub_requests.len());
        for sub in &sub_requests {
            sub_results.push(self.run_search(&schema, &indexes, sub)?.results);
        }
        let fused = task.post_process_search(sub_results)?;
        if fused.ids.is_empty() {
            return Ok(task.finish_empty(fused));
        }

        let query = task.process_query(request, &fused)?;
        let plan = task.retrieve_plan(&query, &fused)?;
        let fetched = engine_call(
            "retrieve",
            collection,
            self.engine.retrieve(collection, &plan.to_bytes()?),
        )?;
        task.post_process(&fetched, fused)
    }

    /// Insert a batch of columns. Function outputs (BM25 sparse vectors) are
    /// derived here and their statistics are added in the same transaction as
    /// the row write.
    pub fn insert(&self, collection: &str, mut fields: Vec<FieldData>) -> Result<InsertResults> {
        let schema = self.schemas.get_schema(collection)?;
        let executor = self.executor(&schema)?;
        rejected("insert", collection, executor.process_insert(&mut fields))?;

        let deltas = self.collect_stats(&schema, &fields)?;

        let _guard = self.write_lock.lock();
        let ids = with_transaction(self.stats.as_ref(), || {
            for (field, delta) in &deltas {
                self.stats.apply_insert(collection, field, delta)?;
            }
            engine_call("insert", collection, self.writer.insert(collection, &fields))
        })?;

        info!("inserted {} rows into {collection}", ids.len());
        Ok(InsertResults {
            insert_cnt: ids.len() as i64,
            ids,
        })
    }

    /// Delete the rows matching the request filter, removing their
    /// contribution to the BM25 statistics.
    pub fn delete(&self, request: &DeleteRequest) -> Result<DeleteResults> {
        let collection = request.collection_name.as_str();
        let schema = self.schemas.get_schema(collection)?;
        let task = DeleteTask::new(&schema);
        let mut plan = rejected("delete", collection, task.process(request))?;

        let derived: Vec<i64> = schema
            .functions()
            .iter()
            .flat_map(|f| f.output_field_names.iter())
            .filter_map(|name| schema.field(name))
            .map(|f| f.field_id)
            .collect();
        plan.output_field_ids.extend(derived.iter().copied());

        let raw = engine_call(
            "retrieve",
            collection,
            self.engine.retrieve(collection, &plan.to_bytes()?),
        )?;
        let unique = raw.ids.dedup_indexes();
        let ids = raw.ids.pick(&unique)?;
        if ids.is_empty() {
            return Ok(DeleteResults::default());
        }

        let columns = raw
            .fields_data
            .iter()
            .filter(|column| derived.contains(&column.field_id))
            .map(|column| column.pick(&unique))
            .collect::<Result<Vec<_>>>()?;
        let deltas = self.collect_stats(&schema, &columns)?;

        let _guard = self.write_lock.lock();
        with_transaction(self.stats.as_ref(), || {
            for (field, delta) in &deltas {
                self.stats.apply_delete(collection, field, delta)?;
            }
            engine_call("delete", collection, self.writer.delete(collection, &ids))
        })?;

        info!("deleted {} rows from {collection}", ids.len());
        Ok(task.post_process(&RetrieveResult::new(ids, Vec::new())))
    }

    /// Statistics deltas of every BM25 output column present in `fields`.
    fn collect_stats(
        &self,
        schema: &CollectionSchema,
        fields: &[FieldData],
    ) -> Result<Vec<(String, Bm25Stats)>> {
        let outputs = schema.function_output_fields();
        fields
            .iter()
            .filter_map(|column| {
                schema
                    .field_by_id(column.field_id)
                    .filter(|field| outputs.contains(field.name.as_str()))
                    .map(|field| (field.name.clone(), column))
            })
            .map(|(name, column)| Ok((name, Bm25Stats::from_rows(sparse_rows(column)?)?)))
            .collect()
    }

    /// Average document length of a BM25 output field, or the configured
    /// default while the field holds no documents.
    pub fn bm25_avgdl(&self, collection: &str, field: &str) -> Result<f64> {
        let stats = self.stats.stats(collection, field)?;
        Ok(if stats.doc_num > 0 {
            stats.avgdl()
        } else {
            self.config.bm25_default_avgdl
        })
    }

    /// Forget every statistic and cached function of `collection`.
    pub fn drop_collection_stats(&self, collection: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.executors.write().remove(collection);
        self.stats.drop_collection_stats(collection)?;
        info!("dropped bm25 stats of {collection}");
        Ok(())
    }
}
