//! Command implementations for the vecnode CLI.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{NodeConfig, PLACEHOLDER_TAG};
use crate::data::{Placeholder, PlaceholderGroup, SearchResultData};
use crate::error::{Result, VecnodeError};
use crate::expr::compile_filter;
use crate::function::{FunctionExecutor, decode_sparse};
use crate::output_fields::{field_ids, translate_output_fields};
use crate::rank::params::{
    RANK_PARAMS_KEY, RANK_TYPE_KEY, RRF_K_KEY, RRF_RANK_TYPE, WEIGHTED_RANK_TYPE, WEIGHTS_KEY,
};
use crate::rank::{RankParams, RankStrategy, ReScorer, new_rescorers, rescore_and_fuse};
use crate::schema::{CollectionSchema, KeyValuePair};
use crate::task::params::{LIMIT_KEY, OFFSET_KEY, ROUND_DECIMAL_KEY};

/// Execute a CLI command.
pub fn execute_command(args: VecnodeArgs) -> Result<()> {
    match &args.command {
        Command::Compile(compile_args) => compile(compile_args, &args),
        Command::OutputFields(fields_args) => output_fields(fields_args, &args),
        Command::Embed(embed_args) => embed(embed_args, &args),
        Command::Fuse(fuse_args) => fuse(fuse_args, &args),
    }
}

/// Compile a filter and print its typed expression tree.
fn compile(args: &CompileArgs, cli_args: &VecnodeArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let expr = compile_filter(&schema, &args.filter)?;

    output_result(
        "Filter compiled",
        &CompileResult {
            filter: args.filter.clone(),
            data_type: expr.dtype.to_string(),
            expr,
        },
        cli_args,
    )
}

/// Expand an output field list.
fn output_fields(args: &OutputFieldsArgs, cli_args: &VecnodeArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let fields = translate_output_fields(&args.fields, &schema, args.with_pk)?;
    let field_ids = field_ids(&fields.result_fields, &schema)?;

    output_result(
        "Output fields",
        &OutputFieldsResult {
            result_fields: fields.result_fields,
            user_fields: fields.user_fields,
            field_ids,
        },
        cli_args,
    )
}

/// Encode texts with the BM25 function producing `--field`.
fn embed(args: &EmbedArgs, cli_args: &VecnodeArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    let executor = FunctionExecutor::for_output(&schema, &args.field, &config)?;

    let group = PlaceholderGroup::single(Placeholder::texts(PLACEHOLDER_TAG, &args.texts));
    let encoded = executor.process_search(&group)?;
    let rows = encoded
        .placeholders
        .first()
        .map(|placeholder| placeholder.values.as_slice())
        .unwrap_or_default();

    let mut vectors = Vec::with_capacity(args.texts.len());
    for (text, raw) in args.texts.iter().zip(rows) {
        let terms = decode_sparse(raw)?;
        debug!("{} distinct tokens in {text:?}", terms.len());
        vectors.push(EmbeddedText {
            text: text.clone(),
            terms: terms
                .into_iter()
                .map(|(token, count)| SparseTerm { token, count })
                .collect(),
        });
    }

    output_result(
        "BM25 term frequencies",
        &EmbedResult {
            field: args.field.clone(),
            vectors,
        },
        cli_args,
    )
}

/// One sub-search result in a fusion input file.
#[derive(Debug, Deserialize)]
struct SubResult {
    metric_type: String,
    result: SearchResultData,
}

/// Rank parameters equivalent to the fusion flags.
fn rank_params(args: &FuseArgs) -> Result<Vec<KeyValuePair>> {
    let (rank_type, params) = match args.strategy {
        RankStrategyArg::Rrf => (RRF_RANK_TYPE, serde_json::json!({ RRF_K_KEY: args.k })),
        RankStrategyArg::Weighted => (
            WEIGHTED_RANK_TYPE,
            serde_json::json!({ WEIGHTS_KEY: args.weights }),
        ),
    };
    Ok(vec![
        KeyValuePair::new(RANK_TYPE_KEY, rank_type),
        KeyValuePair::new(RANK_PARAMS_KEY, serde_json::to_string(&params)?),
        KeyValuePair::new(LIMIT_KEY, args.limit.to_string()),
        KeyValuePair::new(OFFSET_KEY, args.offset.to_string()),
        KeyValuePair::new(ROUND_DECIMAL_KEY, args.round_decimal.to_string()),
    ])
}

/// Fuse the sub-results of a file.
fn fuse(args: &FuseArgs, cli_args: &VecnodeArgs) -> Result<()> {
    let content = fs::read_to_string(&args.input)?;
    let inputs: Vec<SubResult> = serde_json::from_str(&content)?;
    let nq = inputs
        .first()
        .map(|input| input.result.num_queries)
        .ok_or_else(|| VecnodeError::parameter_invalid("No subrequest found"))?;
    if let Some(other) = inputs.iter().find(|input| input.result.num_queries != nq) {
        return Err(VecnodeError::parameter_invalid(format!(
            "sub search request nq should be the same: invalid parameter[expected={nq}][actual={}]",
            other.result.num_queries
        )));
    }

    let params = rank_params(args)?;
    let rank = RankParams::parse(&params)?;
    let strategy = RankStrategy::parse(&params, inputs.len())?;
    let mut scorers = new_rescorers(inputs.len(), &strategy);
    let mut results = Vec::with_capacity(inputs.len());
    for (input, scorer) in inputs.into_iter().zip(scorers.iter_mut()) {
        scorer.set_metric_type(&input.metric_type);
        results.push(input.result);
    }
    info!(
        "fusing {} sub-results of {nq} queries with {:?}",
        results.len(),
        args.strategy
    );

    let fused = rescore_and_fuse(results, &scorers, usize::try_from(nq).unwrap_or(0), &rank)?;
    output_result("Fused results", &FusedResults::from(&fused), cli_args)
}

fn load_schema(path: &Path) -> Result<CollectionSchema> {
    let content = fs::read_to_string(path)?;
    let schema = CollectionSchema::from_json(&content)?;
    debug!("loaded schema {} from {}", schema.name, path.display());
    Ok(schema)
}
