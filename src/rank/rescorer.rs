//! Per-sub-search score rewriting ahead of fusion.

use std::f64::consts::PI;
use std::fmt::Debug;

use crate::data::SearchResultData;
use crate::rank::params::{RRF_RANK_TYPE, RankStrategy, WEIGHTED_RANK_TYPE};
use crate::task::search::positively_related;

/// Rewrites the scores of one sub-search result in place.
pub trait ReScorer: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn metric_type(&self) -> &str;

    /// Metric the sub-search ran with; set once it has been validated.
    fn set_metric_type(&mut self, metric_type: &str);

    fn rescore(&self, data: &mut SearchResultData);
}

/// Reciprocal rank fusion: hit `i` of a query scores `1 / (k + i + 1)`.
#[derive(Debug, Clone)]
pub struct RrfScorer {
    k: f64,
    metric_type: String,
}

impl RrfScorer {
    pub fn new(k: f64) -> Self {
        RrfScorer {
            k,
            metric_type: String::new(),
        }
    }

    pub fn score(&self, rank: usize) -> f32 {
        (1.0 / (self.k + rank as f64 + 1.0)) as f32
    }
}

impl ReScorer for RrfScorer {
    fn name(&self) -> &str {
        RRF_RANK_TYPE
    }

    fn metric_type(&self) -> &str {
        &self.metric_type
    }

    fn set_metric_type(&mut self, metric_type: &str) {
        self.metric_type = metric_type.to_string();
    }

    fn rescore(&self, data: &mut SearchResultData) {
        for (start, len) in data.query_ranges() {
            for (rank, score) in data.scores.iter_mut().skip(start).take(len).enumerate() {
                *score = self.score(rank);
            }
        }
    }
}

/// Maps raw scores onto `[0, 1]` by metric and scales them by a weight.
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    weight: f32,
    metric_type: String,
}

impl WeightedScorer {
    pub fn new(weight: f32) -> Self {
        WeightedScorer {
            weight,
            metric_type: String::new(),
        }
    }

    /// `distance` is the raw engine value, before any sign flip.
    pub fn activate(&self, distance: f32) -> f32 {
        let d = f64::from(distance);
        let activated = match self.metric_type.to_uppercase().as_str() {
            "COSINE" => (1.0 + d) * 0.5,
            "IP" => 0.5 + d.atan() / PI,
            _ => 1.0 - 2.0 * d.atan() / PI,
        };
        activated.clamp(0.0, 1.0) as f32
    }

    pub fn score(&self, score: f32) -> f32 {
        // Search results carry negated distances for distance-like metrics.
        let distance = if positively_related(&self.metric_type) {
            score
        } else {
            -score
        };
        self.weight * self.activate(distance)
    }
}

impl ReScorer for WeightedScorer {
    fn name(&self) -> &str {
        WEIGHTED_RANK_TYPE
    }

    fn metric_type(&self) -> &str {
        &self.metric_type
    }

    fn set_metric_type(&mut self, metric_type: &str) {
        self.metric_type = metric_type.to_string();
    }

    fn rescore(&self, data: &mut SearchResultData) {
        for score in &mut data.scores {
            *score = self.score(*score);
        }
    }
}

/// One scorer per sub-search.
pub fn new_rescorers(request_count: usize, strategy: &RankStrategy) -> Vec<Box<dyn ReScorer>> {
    match strategy {
        RankStrategy::Rrf { k } => (0..request_count)
            .map(|_| Box::new(RrfScorer::new(*k)) as Box<dyn ReScorer>)
            .collect(),
        RankStrategy::Weighted { weights } => weights
            .iter()
            .map(|&weight| Box::new(WeightedScorer::new(weight)) as Box<dyn ReScorer>)
            .collect(),
    }
}
