//! Criterion benchmarks for vecnode.
//!
//! Covers the per-request hot paths:
//! - filter compilation
//! - BM25 text encoding
//! - hybrid search rank fusion

use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use vecnode::analysis::Analyzer;
use vecnode::data::{FieldData, FieldValues, Ids, SearchResultData};
use vecnode::expr::compile_filter;
use vecnode::function::FunctionExecutor;
use vecnode::rank::{RankParams, RankStrategy, ReScorer, new_rescorers, rescore_and_fuse};
use vecnode::schema::field::ANALYZER_PARAMS_KEY;
use vecnode::schema::{CollectionSchema, DataType, FieldSchema, FunctionSchema, KeyValuePair};

fn schema() -> CollectionSchema {
    CollectionSchema::builder("bench")
        .field(FieldSchema::new(100, "id", DataType::Int64).primary_key())
        .field(FieldSchema::new(101, "age", DataType::Int64))
        .field(FieldSchema::new(102, "score", DataType::Double))
        .field(
            FieldSchema::new(103, "text", DataType::VarChar)
                .with_type_param(ANALYZER_PARAMS_KEY, r#"{"tokenizer": "standard"}"#),
        )
        .field(
            FieldSchema::new(104, "tags", DataType::Array).with_element_type(DataType::Int64),
        )
        .field(FieldSchema::new(105, "sparse", DataType::SparseFloatVector))
        .function(FunctionSchema::bm25("bm25", "text", "sparse"))
        .enable_dynamic_field()
        .build()
        .unwrap()
}

/// Generate test documents for benchmarking.
fn generate_test_documents(count: usize) -> Vec<String> {
    let words = [
        "vector", "search", "filter", "query", "plan", "segment", "index", "collection",
        "partition", "schema", "field", "score", "fusion", "ranking", "token", "sparse",
    ];

    (0..count)
        .map(|i| {
            let doc_length = 20 + (i % 50);
            (0..doc_length)
                .map(|j| words[(i * 7 + j * 13) % words.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Sub-results of `nq` queries with `topk` hits each, ids drawn from an
/// overlapping range so fusion has collisions to merge.
fn generate_sub_results(count: usize, nq: usize, topk: usize) -> Vec<SearchResultData> {
    (0..count)
        .map(|r| {
            let ids: Vec<i64> = (0..nq * topk)
                .map(|i| ((i * 31 + r * 17) % (topk * 2)) as i64 + (i / topk * 10_000) as i64)
                .collect();
            SearchResultData {
                num_queries: nq as i64,
                top_k: topk as i64,
                topks: vec![topk as i64; nq],
                scores: (0..nq * topk).map(|i| 1.0 - (i % topk) as f32 / topk as f32).collect(),
                ids: Ids::Int(ids),
                ..Default::default()
            }
        })
        .collect()
}

/// Benchmark filter compilation.
fn bench_filter_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_compile");
    let schema = schema();

    let filters = [
        ("relational", "age > 18 and score <= 0.5"),
        ("term", "id in [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]"),
        ("like", r#"text like "vec%" or text like "%search""#),
        ("json", r#"$meta["color"] == "red" and json_contains($meta["sizes"], 3)"#),
        ("array", "array_contains_any(tags, [1, 2, 3]) && array_length(tags) == 3"),
        ("arith", "age + 2 == 20 and not (score < 0.1 || score > 0.9)"),
    ];

    for (name, filter) in filters {
        group.bench_function(name, |b| {
            b.iter(|| {
                let result = compile_filter(&schema, black_box(filter));
                black_box(result)
            })
        });
    }

    group.finish();
}

/// Benchmark BM25 analysis and encoding.
fn bench_bm25_embed(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_embed");

    let analyzer = Analyzer::from_params(r#"{"tokenizer": "standard"}"#).unwrap();
    let texts = generate_test_documents(1000);

    group.bench_function("analyze_single_document", |b| {
        b.iter(|| {
            let result = analyzer.analyze(black_box(&texts[0]));
            black_box(result)
        })
    });

    let schema = schema();
    let executor = FunctionExecutor::new(&schema).unwrap();
    let batch = texts[..100].to_vec();
    group.throughput(Throughput::Elements(100));
    group.bench_function("process_insert_batch", |b| {
        b.iter(|| {
            let mut fields = vec![FieldData::new(
                103,
                "text",
                DataType::VarChar,
                FieldValues::String(batch.clone()),
            )];
            let result = executor.process_insert(black_box(&mut fields));
            black_box((result, fields))
        })
    });

    group.finish();
}

/// Benchmark hybrid search rank fusion.
fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion");

    let rank_params = vec![KeyValuePair::new("limit", "100")];
    let rank = RankParams::parse(&rank_params).unwrap();
    let nq = 10;
    let inputs = generate_sub_results(3, nq, 100);

    for (name, strategy) in [
        ("rrf", RankStrategy::Rrf { k: 60.0 }),
        (
            "weighted",
            RankStrategy::Weighted {
                weights: vec![0.5, 0.3, 0.2],
            },
        ),
    ] {
        let mut scorers = new_rescorers(inputs.len(), &strategy);
        for scorer in scorers.iter_mut() {
            scorer.set_metric_type("IP");
        }

        group.throughput(Throughput::Elements((inputs.len() * nq * 100) as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let result = rescore_and_fuse(black_box(inputs.clone()), &scorers, nq, &rank);
                black_box(result)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter_compile, bench_bm25_embed, bench_fusion);

criterion_main!(benches);
