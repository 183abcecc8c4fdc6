//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, VecnodeArgs};
use crate::data::{PrimaryKey, SearchResultData};
use crate::error::Result;
use crate::expr::TypedExpr;

/// Result structure for filter compilation.
#[derive(Debug, Serialize)]
pub struct CompileResult {
    pub filter: String,
    pub data_type: String,
    pub expr: TypedExpr,
}

/// Result structure for output field expansion.
#[derive(Debug, Serialize, Deserialize)]
pub struct OutputFieldsResult {
    pub result_fields: Vec<String>,
    pub user_fields: Vec<String>,
    pub field_ids: Vec<i64>,
}

/// One token of a sparse vector.
#[derive(Debug, Serialize, Deserialize)]
pub struct SparseTerm {
    pub token: u32,
    pub count: f32,
}

/// Sparse encoding of one text.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddedText {
    pub text: String,
    pub terms: Vec<SparseTerm>,
}

/// Result structure for BM25 encoding.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedResult {
    pub field: String,
    pub vectors: Vec<EmbeddedText>,
}

/// A fused hit.
#[derive(Debug, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: PrimaryKey,
    pub score: f32,
}

/// Result structure for rank fusion, hits grouped by query.
#[derive(Debug, Serialize, Deserialize)]
pub struct FusedResults {
    pub num_queries: i64,
    pub top_k: i64,
    pub queries: Vec<Vec<FusedHit>>,
}

impl From<&SearchResultData> for FusedResults {
    fn from(data: &SearchResultData) -> Self {
        let queries = data
            .query_ranges()
            .into_iter()
            .map(|(start, len)| {
                (start..start + len)
                    .filter_map(|i| {
                        Some(FusedHit {
                            id: data.ids.get(i)?,
                            score: *data.scores.get(i)?,
                        })
                    })
                    .collect()
            })
            .collect();
        FusedResults {
            num_queries: data.num_queries,
            top_k: data.top_k,
            queries,
        }
    }
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &VecnodeArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &VecnodeArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;

    match result {
        _ if std::any::type_name::<T>().ends_with("FusedResults") => output_fused_human(&value),
        _ if std::any::type_name::<T>().ends_with("CompileResult") => output_compile_human(&value),
        _ => output_generic_human(&value),
    }
    Ok(())
}

/// Output fused hits, one block per query.
fn output_fused_human(value: &serde_json::Value) {
    let Some(queries) = value.get("queries").and_then(|q| q.as_array()) else {
        return;
    };
    for (i, hits) in queries.iter().enumerate() {
        println!("Query {i}:");
        for (rank, hit) in hits.as_array().into_iter().flatten().enumerate() {
            let id = hit.get("id").map(format_key).unwrap_or_default();
            let score = hit.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0);
            println!("  {:>3}. {id} (score: {score:.4})", rank + 1);
        }
    }
}

/// Output the filter, its type, and the expression tree as pretty JSON.
fn output_compile_human(value: &serde_json::Value) {
    if let Some(filter) = value.get("filter") {
        println!("filter: {}", format_value(filter));
    }
    if let Some(data_type) = value.get("data_type") {
        println!("type: {}", format_value(data_type));
    }
    if let Some(expr) = value.get("expr")
        && let Ok(pretty) = serde_json::to_string_pretty(expr)
    {
        println!("{pretty}");
    }
}

/// Output generic data in human format.
fn output_generic_human(value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                let formatted_val = format_value(val);
                println!("{key}: {formatted_val}");
            }
        }
        _ => {
            let formatted_value = format_value(value);
            println!("{formatted_value}");
        }
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &VecnodeArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a serialized primary key (`{"Int": 3}` or `{"Str": "a"}`).
fn format_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(obj) => obj.values().map(format_value).collect(),
        other => format_value(other),
    }
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Ids;

    #[test]
    fn test_format_value() {
        assert_eq!(
            format_value(&serde_json::Value::String("test".to_string())),
            "test"
        );
        assert_eq!(
            format_value(&serde_json::Value::Number(serde_json::Number::from(42))),
            "42"
        );
        assert_eq!(format_value(&serde_json::json!([1, "a"])), "[1, a]");
        assert_eq!(format_value(&serde_json::Value::Null), "null");
    }

    #[test]
    fn test_format_key() {
        let key = serde_json::to_value(PrimaryKey::Int(7)).unwrap();
        assert_eq!(format_key(&key), "7");
        let key = serde_json::to_value(PrimaryKey::Str("doc".into())).unwrap();
        assert_eq!(format_key(&key), "doc");
    }

    #[test]
    fn test_fused_results_grouped_by_query() {
        let data = SearchResultData {
            num_queries: 2,
            top_k: 2,
            topks: vec![2, 1],
            scores: vec![0.9, 0.5, 0.7],
            ids: Ids::Int(vec![4, 2, 8]),
            ..Default::default()
        };
        let fused = FusedResults::from(&data);
        assert_eq!(fused.queries.len(), 2);
        assert_eq!(fused.queries[0].len(), 2);
        assert_eq!(fused.queries[1][0].id, PrimaryKey::Int(8));
        assert_eq!(fused.queries[1][0].score, 0.7);
    }
}
