//! Command line argument parsing for the vecnode CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// vecnode - filter compiler, BM25 encoder and rank fusion for a vector database node
#[derive(Parser, Debug, Clone)]
#[command(name = "vecnode")]
#[command(about = "Filter compiler, BM25 encoder and rank fusion for a vector database node")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct VecnodeArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl VecnodeArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile a filter expression against a collection schema
    Compile(CompileArgs),

    /// Expand an output field list against a collection schema
    #[command(name = "output-fields")]
    OutputFields(OutputFieldsArgs),

    /// Encode texts into BM25 term-frequency sparse vectors
    Embed(EmbedArgs),

    /// Fuse the results of several searches
    Fuse(FuseArgs),
}

/// Arguments for compiling a filter
#[derive(Parser, Debug, Clone)]
pub struct CompileArgs {
    /// Collection schema file (JSON)
    #[arg(short, long, env = "VECNODE_SCHEMA", value_name = "SCHEMA_FILE")]
    pub schema: PathBuf,

    /// Filter expression
    #[arg(value_name = "FILTER")]
    pub filter: String,
}

/// Arguments for expanding output fields
#[derive(Parser, Debug, Clone)]
pub struct OutputFieldsArgs {
    /// Collection schema file (JSON)
    #[arg(short, long, env = "VECNODE_SCHEMA", value_name = "SCHEMA_FILE")]
    pub schema: PathBuf,

    /// Requested output fields; `*` selects every non-vector field
    #[arg(value_name = "FIELD")]
    pub fields: Vec<String>,

    /// Always include the primary key
    #[arg(long)]
    pub with_pk: bool,
}

/// Arguments for BM25 encoding
#[derive(Parser, Debug, Clone)]
pub struct EmbedArgs {
    /// Collection schema file (JSON)
    #[arg(short, long, env = "VECNODE_SCHEMA", value_name = "SCHEMA_FILE")]
    pub schema: PathBuf,

    /// BM25 output field whose function encodes the texts
    #[arg(long, value_name = "FIELD")]
    pub field: String,

    /// Node configuration file (JSON)
    #[arg(short, long, env = "VECNODE_CONFIG", value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Texts to encode
    #[arg(value_name = "TEXT", required = true)]
    pub texts: Vec<String>,
}

/// Arguments for rank fusion
#[derive(Parser, Debug, Clone)]
pub struct FuseArgs {
    /// Sub-results file (JSON array of `{"metric_type": .., "result": ..}`)
    #[arg(value_name = "RESULTS_FILE")]
    pub input: PathBuf,

    /// Fusion strategy
    #[arg(long, default_value = "rrf")]
    pub strategy: RankStrategyArg,

    /// RRF smoothing constant
    #[arg(short, long, default_value = "60")]
    pub k: f64,

    /// Weights of the weighted strategy, one per sub-result
    #[arg(short, long, value_delimiter = ',')]
    pub weights: Vec<f32>,

    /// Hits kept per query
    #[arg(short, long, default_value = "10")]
    pub limit: i64,

    /// Hits skipped per query
    #[arg(long, default_value = "0")]
    pub offset: i64,

    /// Decimal places scores are rounded to (-1 keeps them as is)
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    pub round_decimal: i64,
}

/// Fusion strategies
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankStrategyArg {
    /// Reciprocal rank fusion
    Rrf,
    /// Weighted score fusion
    Weighted,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_compile_command() {
        let args = VecnodeArgs::try_parse_from([
            "vecnode",
            "compile",
            "--schema",
            "schema.json",
            "age > 3 && name like \"a%\"",
        ])
        .unwrap();

        if let Command::Compile(compile_args) = args.command {
            assert_eq!(compile_args.schema, PathBuf::from("schema.json"));
            assert_eq!(compile_args.filter, "age > 3 && name like \"a%\"");
        } else {
            panic!("Expected Compile command");
        }
    }

    #[test]
    fn test_fuse_command() {
        let args = VecnodeArgs::try_parse_from([
            "vecnode",
            "fuse",
            "results.json",
            "--strategy",
            "weighted",
            "--weights",
            "0.7,0.3",
            "--limit",
            "5",
            "--round-decimal",
            "2",
        ])
        .unwrap();

        if let Command::Fuse(fuse_args) = args.command {
            assert_eq!(fuse_args.strategy, RankStrategyArg::Weighted);
            assert_eq!(fuse_args.weights, vec![0.7, 0.3]);
            assert_eq!(fuse_args.limit, 5);
            assert_eq!(fuse_args.offset, 0);
            assert_eq!(fuse_args.round_decimal, 2);
        } else {
            panic!("Expected Fuse command");
        }
    }

    #[test]
    fn test_embed_requires_text() {
        assert!(
            VecnodeArgs::try_parse_from(["vecnode", "embed", "-s", "s.json", "--field", "sparse"])
                .is_err()
        );
    }

    #[test]
    fn test_verbosity_levels() {
        let args = VecnodeArgs::try_parse_from(["vecnode", "compile", "-s", "s.json", "a"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args =
            VecnodeArgs::try_parse_from(["vecnode", "-vv", "compile", "-s", "s.json", "a"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args =
            VecnodeArgs::try_parse_from(["vecnode", "--quiet", "compile", "-s", "s.json", "a"])
                .unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args = VecnodeArgs::try_parse_from([
            "vecnode", "--format", "json", "--pretty", "compile", "-s", "s.json", "a",
        ])
        .unwrap();
        assert!(matches!(args.output_format, OutputFormat::Json));
        assert!(args.pretty);
    }
}
