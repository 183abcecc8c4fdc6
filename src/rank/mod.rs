//! Hybrid search ranking: rank params, per-sub-search re-scorers and fusion.

pub mod fusion;
pub mod params;
pub mod rescorer;

pub use fusion::{accumulate, fuse, rescore_and_fuse};
pub use params::{RankParams, RankStrategy};
pub use rescorer::{ReScorer, RrfScorer, WeightedScorer, new_rescorers};
